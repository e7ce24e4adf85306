//! # YIN Pitch Tracking
//!
//! Time-domain fundamental frequency estimation (de Cheveigné & Kawahara).
//!
//! ## Per frame:
//! 1. **Difference function** `d(τ) = Σ (x[j] - x[j+τ])²` over an integration
//!    window of `frame_length / 2` samples
//! 2. **Cumulative mean normalisation** `d'(τ) = d(τ) · τ / Σ_{1..τ} d`
//! 3. **Absolute threshold**: first τ in the lag range with `d'(τ)` below the
//!    threshold, then walk down to the bottom of that trough
//! 4. **Parabolic interpolation** around the trough for sub-sample precision
//!
//! ## Unvoiced frames:
//! A frame is unvoiced when it is silent or when no trough dips below the
//! threshold. Unvoiced frames carry no estimate and are left out of the mean;
//! a clip with no voiced frames reports a pitch of 0.0.

use super::frames::{frames, pad_center};

/// Mean square below which a frame is treated as silence (RMS ~ -100 dBFS).
const SILENCE_MEAN_SQUARE: f64 = 1e-10;

/// Parameters for one tracking run.
#[derive(Debug, Clone)]
pub struct YinParams {
    pub sample_rate: u32,
    pub frame_length: usize,
    pub hop_length: usize,
    pub min_lag: usize,
    pub max_lag: usize,
    pub threshold: f64,
}

/// Per-frame fundamental frequency estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchTrack {
    /// `Some(hz)` for voiced frames, `None` for unvoiced ones.
    pub frames: Vec<Option<f64>>,
}

impl PitchTrack {
    pub fn voiced_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    /// Mean F0 over voiced frames, 0.0 when nothing was voiced.
    pub fn mean_voiced(&self) -> f64 {
        let (sum, count) = self
            .frames
            .iter()
            .flatten()
            .fold((0.0, 0usize), |(sum, count), &hz| (sum + hz, count + 1));
        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Run the tracker over a whole waveform.
pub fn track(samples: &[f32], params: &YinParams) -> PitchTrack {
    let padded = pad_center(samples, params.frame_length);
    let mut scratch = YinScratch::new(params.max_lag);
    let estimates = frames(&padded, params.frame_length, params.hop_length)
        .map(|frame| scratch.estimate(frame, params))
        .collect();
    PitchTrack { frames: estimates }
}

/// Reusable buffers so frames don't allocate.
struct YinScratch {
    difference: Vec<f64>,
    normalized: Vec<f64>,
}

impl YinScratch {
    fn new(max_lag: usize) -> Self {
        Self {
            difference: vec![0.0; max_lag + 1],
            normalized: vec![1.0; max_lag + 1],
        }
    }

    fn estimate(&mut self, frame: &[f32], params: &YinParams) -> Option<f64> {
        let window = params.frame_length / 2;
        let max_lag = params.max_lag;

        let mean_square = frame.iter().map(|&s| (s as f64) * (s as f64)).sum::<f64>() / frame.len() as f64;
        if mean_square < SILENCE_MEAN_SQUARE {
            return None;
        }

        self.difference[0] = 0.0;
        for lag in 1..=max_lag {
            let mut sum = 0.0;
            for j in 0..window {
                let delta = frame[j] as f64 - frame[j + lag] as f64;
                sum += delta * delta;
            }
            self.difference[lag] = sum;
        }

        self.normalized[0] = 1.0;
        let mut running = 0.0;
        for lag in 1..=max_lag {
            running += self.difference[lag];
            self.normalized[lag] = if running > 0.0 {
                self.difference[lag] * lag as f64 / running
            } else {
                1.0
            };
        }

        let mut lag = (params.min_lag..=max_lag).find(|&l| self.normalized[l] < params.threshold)?;
        while lag < max_lag && self.normalized[lag + 1] < self.normalized[lag] {
            lag += 1;
        }

        let period = lag as f64 + self.parabolic_shift(lag, params.min_lag, max_lag);
        if period <= 0.0 {
            return None;
        }
        Some(params.sample_rate as f64 / period)
    }

    /// Offset of the true minimum from `lag`, in [-1, 1].
    fn parabolic_shift(&self, lag: usize, min_lag: usize, max_lag: usize) -> f64 {
        if lag <= min_lag || lag >= max_lag {
            return 0.0;
        }
        let (left, center, right) = (self.normalized[lag - 1], self.normalized[lag], self.normalized[lag + 1]);
        let curvature = left - 2.0 * center + right;
        if curvature.abs() < f64::EPSILON {
            return 0.0;
        }
        (0.5 * (left - right) / curvature).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn params() -> YinParams {
        YinParams {
            sample_rate: 16_000,
            frame_length: 2048,
            hop_length: 512,
            min_lag: 53,
            max_lag: 320,
            threshold: 0.1,
        }
    }

    fn sine(freq: f64, amplitude: f64, seconds: f64) -> Vec<f32> {
        let n = (16_000.0 * seconds) as usize;
        (0..n)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / 16_000.0).sin()) as f32)
            .collect()
    }

    #[test]
    fn test_tracks_pure_tones() {
        for &freq in &[100.0, 150.0, 220.0, 280.0] {
            let track = track(&sine(freq, 0.3, 1.0), &params());
            let mean = track.mean_voiced();
            assert!((mean - freq).abs() < 3.0, "expected ~{} Hz, got {}", freq, mean);
            assert!(track.voiced_frames() > track.total_frames() / 2);
        }
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let track = track(&vec![0.0; 16_000], &params());
        assert_eq!(track.voiced_frames(), 0);
        assert_eq!(track.total_frames(), 32);
        assert_eq!(track.mean_voiced(), 0.0);
    }

    #[test]
    fn test_unvoiced_frames_are_excluded_from_mean() {
        // Half a second of tone followed by half a second of silence
        let mut samples = sine(200.0, 0.3, 0.5);
        samples.extend(std::iter::repeat(0.0).take(8000));
        let track = track(&samples, &params());

        assert!(track.voiced_frames() < track.total_frames());
        assert!((track.mean_voiced() - 200.0).abs() < 5.0, "got {}", track.mean_voiced());
    }

    #[test]
    fn test_mean_voiced_ignores_none() {
        let track = PitchTrack { frames: vec![Some(100.0), None, Some(200.0), None] };
        assert_eq!(track.voiced_frames(), 2);
        assert_eq!(track.mean_voiced(), 150.0);
    }
}
