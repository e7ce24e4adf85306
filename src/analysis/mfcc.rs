//! # Mel-Frequency Cepstral Coefficients
//!
//! Standard speech front-end:
//! - **Framing**: centered frames, periodic Hann window, zero padded to `n_fft`
//! - **Power spectrum**: `|FFT|²` via rustfft
//! - **Mel filterbank**: Slaney-style mel scale (linear below 1 kHz, log above)
//!   with area-normalised triangular filters spanning 0 Hz to Nyquist
//! - **Log compression**: `10·log10(max(S, 1e-10))`, clipped to 80 dB below
//!   the loudest bin of the clip
//! - **DCT-II**: orthonormal, first `n_mfcc` coefficients kept

use super::frames::{frame_count, pad_center};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

/// Floor applied before taking the logarithm.
const AMIN: f64 = 1e-10;

/// Dynamic range kept below the loudest mel bin (dB).
const TOP_DB: f64 = 80.0;

#[derive(Debug, Clone)]
pub struct MfccParams {
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    pub n_mfcc: usize,
}

/// MFCC extractor with the window, filterbank, DCT basis and FFT plan
/// prepared up front.
pub struct MfccExtractor {
    params: MfccParams,
    window: Vec<f64>,
    mel_basis: Vec<Vec<f64>>,
    dct_basis: Vec<Vec<f64>>,
    fft: Arc<dyn Fft<f64>>,
}

impl MfccExtractor {
    pub fn new(params: MfccParams) -> Self {
        let window = hann_window(params.n_fft);
        let mel_basis = mel_filter_bank(params.n_mels, params.n_fft, params.sample_rate, 0.0, params.sample_rate as f64 / 2.0);
        let dct_basis = dct_ortho_basis(params.n_mfcc, params.n_mels);
        let fft = FftPlanner::<f64>::new().plan_fft_forward(params.n_fft);
        Self { params, window, mel_basis, dct_basis, fft }
    }

    /// Log-mel spectrogram in dB, `[frames][n_mels]`.
    pub fn log_mel_spectrogram(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        let n_fft = self.params.n_fft;
        let half = n_fft / 2 + 1;
        let padded = pad_center(samples, n_fft);
        let count = frame_count(padded.len(), n_fft, self.params.hop_length);

        let mut buffer = vec![Complex::new(0.0, 0.0); n_fft];
        let mut power = vec![0.0; half];
        let mut spectrogram = Vec::with_capacity(count);

        for t in 0..count {
            let start = t * self.params.hop_length;
            for (i, slot) in buffer.iter_mut().enumerate() {
                *slot = Complex::new(padded[start + i] as f64 * self.window[i], 0.0);
            }
            self.fft.process(&mut buffer);
            for (p, bin) in power.iter_mut().zip(buffer.iter()) {
                *p = bin.norm_sqr();
            }

            let mel: Vec<f64> = self
                .mel_basis
                .iter()
                .map(|filter| {
                    let energy: f64 = filter.iter().zip(power.iter()).map(|(w, p)| w * p).sum();
                    10.0 * energy.max(AMIN).log10()
                })
                .collect();
            spectrogram.push(mel);
        }

        // Clip everything more than TOP_DB below the loudest bin of the clip
        let peak = spectrogram
            .iter()
            .flatten()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        let floor = peak - TOP_DB;
        for value in spectrogram.iter_mut().flatten() {
            *value = value.max(floor);
        }

        spectrogram
    }

    /// MFCC matrix, `[frames][n_mfcc]`.
    pub fn extract(&self, samples: &[f32]) -> Vec<Vec<f64>> {
        self.log_mel_spectrogram(samples)
            .iter()
            .map(|mel| {
                self.dct_basis
                    .iter()
                    .map(|row| row.iter().zip(mel.iter()).map(|(c, m)| c * m).sum())
                    .collect()
            })
            .collect()
    }

    /// Mean of each coefficient across all frames.
    pub fn mean_coefficients(&self, samples: &[f32]) -> Vec<f64> {
        let frames = self.extract(samples);
        let mut mean = vec![0.0; self.params.n_mfcc];
        if frames.is_empty() {
            return mean;
        }
        for frame in &frames {
            for (acc, c) in mean.iter_mut().zip(frame.iter()) {
                *acc += c;
            }
        }
        for acc in mean.iter_mut() {
            *acc /= frames.len() as f64;
        }
        mean
    }
}

/// Periodic Hann window (the FFT-analysis variant).
pub fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
        .collect()
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular mel filters, `[n_mels][n_fft / 2 + 1]`, each scaled to unit area.
pub fn mel_filter_bank(n_mels: usize, n_fft: usize, sample_rate: u32, fmin: f64, fmax: f64) -> Vec<Vec<f64>> {
    let half = n_fft / 2 + 1;
    let fft_freqs: Vec<f64> = (0..half)
        .map(|k| k as f64 * sample_rate as f64 / n_fft as f64)
        .collect();

    let (low, high) = (hz_to_mel(fmin), hz_to_mel(fmax));
    let mel_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(low + (high - low) * i as f64 / (n_mels + 1) as f64))
        .collect();

    (0..n_mels)
        .map(|m| {
            let (left, center, right) = (mel_points[m], mel_points[m + 1], mel_points[m + 2]);
            let norm = 2.0 / (right - left);
            fft_freqs
                .iter()
                .map(|&f| {
                    let rising = (f - left) / (center - left);
                    let falling = (right - f) / (right - center);
                    rising.min(falling).max(0.0) * norm
                })
                .collect()
        })
        .collect()
}

/// Orthonormal DCT-II basis, `[n_out][n_in]`.
pub fn dct_ortho_basis(n_out: usize, n_in: usize) -> Vec<Vec<f64>> {
    let n = n_in as f64;
    (0..n_out)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..n_in)
                .map(|i| scale * (PI * k as f64 * (2.0 * i as f64 + 1.0) / (2.0 * n)).cos())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> MfccParams {
        MfccParams {
            sample_rate: 16_000,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            n_mfcc: 20,
        }
    }

    #[test]
    fn test_hann_window_is_periodic() {
        let w = hann_window(8);
        assert!(w[0].abs() < 1e-12);
        assert!((w[4] - 1.0).abs() < 1e-12);
        // Periodic variant: w[1] == w[7], no trailing zero
        assert!((w[1] - w[7]).abs() < 1e-12);
        assert!(w[7] > 0.0);
    }

    #[test]
    fn test_slaney_mel_roundtrip() {
        for &hz in &[0.0, 200.0, 999.0, 1000.0, 4000.0, 8000.0] {
            let back = mel_to_hz(hz_to_mel(hz));
            assert!((hz - back).abs() < 1e-6, "roundtrip failed for {} Hz", hz);
        }
        // Linear region: 1000 Hz is mel 15
        assert!((hz_to_mel(1000.0) - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_mel_filter_bank_shape() {
        let bank = mel_filter_bank(128, 2048, 16_000, 0.0, 8000.0);
        assert_eq!(bank.len(), 128);
        assert_eq!(bank[0].len(), 1025);
        assert!(bank.iter().flatten().all(|&w| w >= 0.0));
        // Every filter picks up at least one FFT bin at this resolution
        assert!(bank.iter().all(|filter| filter.iter().any(|&w| w > 0.0)));
    }

    #[test]
    fn test_dct_basis_is_orthonormal() {
        let basis = dct_ortho_basis(20, 128);
        for a in 0..20 {
            for b in 0..20 {
                let dot: f64 = basis[a].iter().zip(basis[b].iter()).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-9, "rows {} and {}: {}", a, b, dot);
            }
        }
    }

    #[test]
    fn test_silence_gives_finite_coefficients() {
        let extractor = MfccExtractor::new(params());
        let mean = extractor.mean_coefficients(&vec![0.0; 8000]);
        assert_eq!(mean.len(), 20);
        assert!(mean.iter().all(|c| c.is_finite()));
        // Flat -100 dB spectrum: all energy in c0
        assert!((mean[0] + 100.0 * 128f64.sqrt()).abs() < 1e-6);
        assert!(mean[1..].iter().all(|c| c.abs() < 1e-6));
    }

    #[test]
    fn test_tone_frames() {
        let extractor = MfccExtractor::new(params());
        let samples: Vec<f32> = (0..16_000)
            .map(|i| (0.3 * (2.0 * PI * 440.0 * i as f64 / 16_000.0).sin()) as f32)
            .collect();
        let mfcc = extractor.extract(&samples);
        assert_eq!(mfcc.len(), 32);
        assert!(mfcc.iter().all(|frame| frame.len() == 20));
        assert!(mfcc.iter().flatten().all(|c| c.is_finite()));
    }
}
