//! Channel downmixing and sample rate conversion.
//!
//! Sample rate conversion uses rubato's FFT resampler, a pure Rust
//! implementation. Output length is `round(len * to / from)` with the
//! resampler's delay trimmed from the front.

use crate::pipeline::error::DecodeError;
use rubato::{FftFixedInOut, Resampler};

/// Frames fed to the resampler per processing block.
const CHUNK_SIZE: usize = 1024;

/// Average interleaved channels into a single mono channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Convert mono samples from `from` Hz to `to` Hz.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, DecodeError> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let to_decode_error = |message: String| DecodeError::Resample { from, to, message };

    let mut resampler = FftFixedInOut::<f32>::new(from as usize, to as usize, CHUNK_SIZE, 1)
        .map_err(|e| to_decode_error(e.to_string()))?;

    let expected = ((samples.len() as u64 * to as u64 + from as u64 / 2) / from as u64) as usize;
    let delay = resampler.output_delay();
    let mut output = Vec::with_capacity(expected + delay + CHUNK_SIZE);
    let mut block = Vec::with_capacity(resampler.input_frames_next());
    let mut position = 0;

    // Keep feeding (zero padding past the end) until the delayed tail has been flushed
    while output.len() < expected + delay {
        let needed = resampler.input_frames_next();
        block.clear();
        if position < samples.len() {
            let end = (position + needed).min(samples.len());
            block.extend_from_slice(&samples[position..end]);
        }
        block.resize(needed, 0.0);
        position += needed;

        let processed = resampler
            .process(&[block.as_slice()], None)
            .map_err(|e| to_decode_error(e.to_string()))?;
        output.extend_from_slice(&processed[0]);
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}
