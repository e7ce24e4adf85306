//! Centered framing shared by every feature extractor.
//!
//! The signal is zero padded by `frame_length / 2` on both sides so that
//! frame `t` is centered on sample `t * hop_length`. A clip of `n` samples
//! yields `1 + n / hop_length` frames.

/// Pad `samples` with `frame_length / 2` zeros on each side.
pub fn pad_center(samples: &[f32], frame_length: usize) -> Vec<f32> {
    let pad = frame_length / 2;
    let mut padded = Vec::with_capacity(samples.len() + 2 * pad);
    padded.resize(pad, 0.0);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + 2 * pad, 0.0);
    padded
}

/// Iterate over the frames of an already padded signal.
pub fn frames(padded: &[f32], frame_length: usize, hop_length: usize) -> impl Iterator<Item = &[f32]> {
    let count = frame_count(padded.len(), frame_length, hop_length);
    (0..count).map(move |t| &padded[t * hop_length..t * hop_length + frame_length])
}

pub fn frame_count(padded_len: usize, frame_length: usize, hop_length: usize) -> usize {
    if padded_len < frame_length || hop_length == 0 {
        return 0;
    }
    1 + (padded_len - frame_length) / hop_length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_center() {
        let padded = pad_center(&[1.0, 2.0, 3.0], 4);
        assert_eq!(padded, vec![0.0, 0.0, 1.0, 2.0, 3.0, 0.0, 0.0]);
    }

    #[test]
    fn test_frame_count_matches_centered_convention() {
        let samples = vec![0.5f32; 16_000];
        let padded = pad_center(&samples, 2048);
        // 1 + 16000 / 512 = 32
        assert_eq!(frame_count(padded.len(), 2048, 512), 32);
        assert_eq!(frames(&padded, 2048, 512).count(), 32);
        assert!(frames(&padded, 2048, 512).all(|f| f.len() == 2048));
    }

    #[test]
    fn test_single_sample_still_yields_a_frame() {
        let padded = pad_center(&[1.0], 2048);
        assert_eq!(frame_count(padded.len(), 2048, 512), 1);
    }
}
