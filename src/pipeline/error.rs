//! # Pipeline Error Taxonomy
//!
//! Every failure in the analysis pipeline falls into one of three buckets:
//! - **DecodeError**: the upload could not be turned into a waveform
//! - **AnalysisError**: the waveform could not be measured
//! - **Io**: staging the upload on disk failed
//!
//! None of these are retried. The HTTP layer maps them onto status codes in
//! `crate::error`.

use crate::audio::AudioFormat;
use thiserror::Error;

/// Failures while turning uploaded bytes into a 16 kHz mono waveform.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no decoder registered for {0}")]
    NoDecoder(AudioFormat),

    #[error("audio payload is empty")]
    EmptyPayload,

    #[error("could not read {format} container: {message}")]
    Container { format: AudioFormat, message: String },

    #[error("{format} container has no decodable audio track")]
    NoAudioTrack { format: AudioFormat },

    #[error("unsupported codec in {format} container: {message}")]
    UnsupportedCodec { format: AudioFormat, message: String },

    #[error("audio track does not declare a sample rate")]
    MissingSampleRate,

    #[error("declared sample rate {0} Hz is outside the supported range")]
    UnsupportedSampleRate(u32),

    #[error("clip is longer than the {limit_seconds} s limit")]
    TooLong { limit_seconds: f64 },

    #[error("decoding produced no samples")]
    NoSamples,

    #[error("transcoder '{program}' is not available: {message}")]
    TranscoderUnavailable { program: String, message: String },

    #[error("transcoder exited with {status}: {stderr}")]
    TranscoderFailed { status: String, stderr: String },

    #[error("resampling from {from} Hz to {to} Hz failed: {message}")]
    Resample { from: u32, to: u32, message: String },
}

/// Failures while extracting features from a decoded waveform.
#[derive(Error, Debug, PartialEq)]
pub enum AnalysisError {
    #[error("waveform is empty")]
    EmptyWaveform,

    #[error("waveform contains a non-finite sample at index {index}")]
    NonFiniteSample { index: usize },

    #[error("waveform sample rate is {actual} Hz, expected {expected} Hz")]
    SampleRateMismatch { expected: u32, actual: u32 },
}

/// Top-level error returned by [`crate::pipeline::VoiceFeaturePipeline`].
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("temporary storage failed: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::NoAudioTrack { format: AudioFormat::WebM };
        assert_eq!(err.to_string(), "webm container has no decodable audio track");

        let err = DecodeError::Resample { from: 44100, to: 16000, message: "boom".to_string() };
        assert_eq!(err.to_string(), "resampling from 44100 Hz to 16000 Hz failed: boom");
    }

    #[test]
    fn test_pipeline_error_wraps_sources() {
        let err: PipelineError = AnalysisError::EmptyWaveform.into();
        assert!(matches!(err, PipelineError::Analysis(AnalysisError::EmptyWaveform)));
        assert_eq!(err.to_string(), "analysis failed: waveform is empty");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
