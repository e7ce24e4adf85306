//! Root-mean-square energy per frame.

use super::frames::{frames, pad_center};

/// RMS of every centered frame.
pub fn frame_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f64> {
    let padded = pad_center(samples, frame_length);
    frames(&padded, frame_length, hop_length)
        .map(|frame| {
            let sum_sq: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
            (sum_sq / frame_length as f64).sqrt()
        })
        .collect()
}

/// Mean of the per-frame RMS values; 0.0 for a signal with no frames.
pub fn mean_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> f64 {
    let rms = frame_rms(samples, frame_length, hop_length);
    if rms.is_empty() {
        return 0.0;
    }
    rms.iter().sum::<f64>() / rms.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_silence_has_zero_energy() {
        assert_eq!(mean_rms(&vec![0.0; 8000], 2048, 512), 0.0);
    }

    #[test]
    fn test_constant_signal_interior_frames() {
        let rms = frame_rms(&vec![0.25; 16_000], 2048, 512);
        // Interior frames see no padding
        assert!((rms[10] - 0.25).abs() < 1e-9);
        // The first frame is half padding
        assert!((rms[0] - 0.25 / 2f64.sqrt()).abs() < 1e-3);
    }

    #[test]
    fn test_sine_energy_close_to_amplitude_over_sqrt2() {
        let amplitude = 0.05 * 2f64.sqrt();
        let samples: Vec<f32> = (0..32_000)
            .map(|i| (amplitude * (2.0 * PI * 220.0 * i as f64 / 16_000.0).sin()) as f32)
            .collect();
        let energy = mean_rms(&samples, 2048, 512);
        // Edge frames pull the mean slightly under 0.05
        assert!(energy > 0.047 && energy < 0.0501, "energy = {}", energy);
    }
}
