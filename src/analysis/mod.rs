//! # Acoustic Feature Extraction
//!
//! Measures a decoded waveform and labels it.
//!
//! ## Features:
//! - **pitch**: mean F0 of voiced frames from a YIN tracker (`pitch.rs`)
//! - **energy**: mean frame RMS (`energy.rs`)
//! - **mfcc**: per-coefficient mean of the MFCC matrix (`mfcc.rs`)
//!
//! ## Labels:
//! - **classify**: threshold rules for stress and fatigue (`classify.rs`)
//!
//! Everything here is a pure function of the waveform and the configuration;
//! no state survives between calls.

pub mod classify;
pub mod energy;
pub mod frames;
pub mod mfcc;
pub mod pitch;

pub use classify::{classify, ClassificationResult, FatigueLevel, StressLevel};

use crate::audio::{Waveform, TARGET_SAMPLE_RATE};
use crate::config::AnalysisConfig;
use crate::pipeline::error::AnalysisError;
use mfcc::{MfccExtractor, MfccParams};
use pitch::YinParams;
use serde::Serialize;

/// Measurements taken from one waveform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureSet {
    /// Mean fundamental frequency over voiced frames (Hz); 0.0 if none were voiced.
    pub pitch: f64,
    /// Mean frame RMS amplitude.
    pub energy: f64,
    /// Mean of each MFCC coefficient across frames.
    pub mfcc: Vec<f64>,
    /// Frames the pitch tracker considered voiced.
    pub voiced_frames: usize,
    /// Frames the pitch tracker looked at.
    pub total_frames: usize,
    pub duration_seconds: f64,
}

/// Feature extractor configured once per request.
pub struct FeatureExtractor {
    yin: YinParams,
    frame_length: usize,
    hop_length: usize,
    mfcc: MfccExtractor,
}

impl FeatureExtractor {
    pub fn new(config: &AnalysisConfig) -> Self {
        let (min_lag, max_lag) = config.pitch_lag_range(TARGET_SAMPLE_RATE);
        Self {
            yin: YinParams {
                sample_rate: TARGET_SAMPLE_RATE,
                frame_length: config.frame_length,
                hop_length: config.hop_length,
                min_lag,
                max_lag,
                threshold: config.yin_threshold,
            },
            frame_length: config.frame_length,
            hop_length: config.hop_length,
            mfcc: MfccExtractor::new(MfccParams {
                sample_rate: TARGET_SAMPLE_RATE,
                n_fft: config.n_fft,
                hop_length: config.hop_length,
                n_mels: config.n_mels,
                n_mfcc: config.n_mfcc,
            }),
        }
    }

    /// Extract pitch, energy and MFCC from a 16 kHz mono waveform.
    ///
    /// ## Errors:
    /// - **EmptyWaveform**: nothing to measure
    /// - **NonFiniteSample**: NaN or infinity anywhere in the signal
    /// - **SampleRateMismatch**: the waveform skipped the decode stage's resampling
    ///
    /// Silence is not an error: it measures as zero energy and zero pitch.
    pub fn extract(&self, wave: &Waveform) -> Result<FeatureSet, AnalysisError> {
        if wave.sample_rate != TARGET_SAMPLE_RATE {
            return Err(AnalysisError::SampleRateMismatch {
                expected: TARGET_SAMPLE_RATE,
                actual: wave.sample_rate,
            });
        }
        if wave.is_empty() {
            return Err(AnalysisError::EmptyWaveform);
        }
        if let Some(index) = wave.samples.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisError::NonFiniteSample { index });
        }

        let track = pitch::track(&wave.samples, &self.yin);
        let energy = energy::mean_rms(&wave.samples, self.frame_length, self.hop_length);
        let mfcc = self.mfcc.mean_coefficients(&wave.samples);

        Ok(FeatureSet {
            pitch: track.mean_voiced(),
            energy,
            mfcc,
            voiced_frames: track.voiced_frames(),
            total_frames: track.total_frames(),
            duration_seconds: wave.duration_seconds(),
        })
    }
}
