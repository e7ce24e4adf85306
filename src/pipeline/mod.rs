//! # Voice Feature Pipeline
//!
//! The one component that does real work per request:
//!
//! ```text
//! AudioClip ──decode──▶ Waveform ──extract──▶ FeatureSet ──classify──▶ ClassificationResult
//! ```
//!
//! The pipeline is synchronous CPU work with no suspension points. Handlers
//! run it on the blocking pool and build a fresh instance from the current
//! configuration each time, so there is nothing shared to lock.

pub mod error;

use crate::analysis::{classify, ClassificationResult, FeatureExtractor, FeatureSet};
use crate::audio::{AudioClip, DecoderRegistry, Waveform};
use crate::config::{AppConfig, ThresholdConfig};
use error::PipelineError;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info};

/// Everything the pipeline learned about one clip.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceAnalysis {
    pub features: FeatureSet,
    pub classification: ClassificationResult,
    pub decode_ms: u64,
    pub analysis_ms: u64,
}

pub struct VoiceFeaturePipeline {
    decoders: DecoderRegistry,
    extractor: FeatureExtractor,
    thresholds: ThresholdConfig,
}

impl VoiceFeaturePipeline {
    pub fn new(decoders: DecoderRegistry, extractor: FeatureExtractor, thresholds: ThresholdConfig) -> Self {
        Self { decoders, extractor, thresholds }
    }

    /// Pipeline with the stock decoders and the configured analysis settings.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            DecoderRegistry::with_defaults(&config.decode),
            FeatureExtractor::new(&config.analysis),
            config.thresholds.clone(),
        )
    }

    /// Bytes + format tag to a 16 kHz mono waveform.
    pub fn decode(&self, clip: &AudioClip) -> Result<Waveform, PipelineError> {
        self.decoders.decode(clip)
    }

    pub fn extract_features(&self, wave: &Waveform) -> Result<FeatureSet, PipelineError> {
        Ok(self.extractor.extract(wave)?)
    }

    pub fn classify(&self, features: &FeatureSet) -> ClassificationResult {
        classify(features, &self.thresholds)
    }

    /// Decode, measure and label one clip. Any failure ends the run.
    pub fn analyze(&self, clip: &AudioClip) -> Result<VoiceAnalysis, PipelineError> {
        let started = Instant::now();
        let wave = self.decode(clip)?;
        let decode_ms = started.elapsed().as_millis() as u64;
        debug!(
            format = %clip.format,
            samples = wave.len(),
            duration_s = wave.duration_seconds(),
            decode_ms,
            "Clip decoded"
        );

        let started = Instant::now();
        let features = self.extract_features(&wave)?;
        let classification = self.classify(&features);
        let analysis_ms = started.elapsed().as_millis() as u64;

        info!(
            pitch_hz = features.pitch,
            energy = features.energy,
            voiced_frames = features.voiced_frames,
            total_frames = features.total_frames,
            stress = %classification.stress_level,
            fatigue = %classification.fatigue_level,
            analysis_ms,
            "Voice analysis complete"
        );

        Ok(VoiceAnalysis { features, classification, decode_ms, analysis_ms })
    }
}
