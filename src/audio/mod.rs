//! # Audio Decoding
//!
//! Turns an uploaded clip into the waveform the analysis stage works on.
//!
//! ## Key Components:
//! - **AudioFormat**: Container tag resolved from MIME type, filename or magic bytes
//! - **AudioDecoder**: Pluggable "bytes + format → waveform" adapter
//! - **SymphoniaDecoder**: In-memory decoding for WAV, FLAC, Ogg/Vorbis and MP3
//! - **FfmpegDecoder**: WebM uploads, staged in a scoped temp file and transcoded
//! - **resample**: Downmix to mono and convert to the fixed analysis rate
//!
//! ## Waveform Contract:
//! - **Sample Rate**: 16kHz (16,000 Hz), always
//! - **Channels**: Mono
//! - **Samples**: `f32` in [-1.0, 1.0]

pub mod decoder;
pub mod format;
pub mod resample;
pub mod transcode;

pub use decoder::{AudioDecoder, DecoderRegistry, SymphoniaDecoder};
pub use format::AudioFormat;
pub use transcode::FfmpegDecoder;

/// Sample rate every decoded waveform is delivered at.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Raw upload plus its declared container format.
///
/// Owned by a single request and dropped once decoding finishes.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioClip {
    pub fn new(data: Vec<u8>, format: AudioFormat) -> Self {
        Self { data, format }
    }
}

/// Decoded mono samples at a known sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the waveform in seconds.
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
