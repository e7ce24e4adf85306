//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms)
//! 2. Environment variables (APP_SERVER__PORT, APP_THRESHOLDS__STRESS_ENERGY, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impls)
//!
//! Nested keys use a double underscore so that field names with underscores
//! survive: `APP_UPLOAD__MAX_UPLOAD_BYTES` maps to `upload.max_upload_bytes`.
//!
//! ## Sections:
//! - **server**: bind address
//! - **cors**: browser origins allowed to call the API
//! - **upload**: multipart limits
//! - **decode**: ffmpeg location and temp staging directory
//! - **analysis**: frame sizes and tracker parameters for feature extraction
//! - **thresholds**: stress / fatigue rule constants
//! - **response**: what the analysis endpoint returns

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
///
/// The whole struct is handed to `ApiServer::new`; nothing reads configuration
/// from globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub upload: UploadConfig,
    pub decode: DecodeConfig,
    pub analysis: AnalysisConfig,
    pub thresholds: ThresholdConfig,
    pub response: ResponseConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Cross-origin settings for the browser recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Exact origins allowed to call the API; `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// How long browsers may cache preflight responses (seconds).
    pub max_age: usize,
}

/// Multipart upload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Largest accepted audio upload in bytes.
    pub max_upload_bytes: usize,
    /// Name of the multipart field that carries the audio.
    pub field_name: String,
}

/// Decode adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeConfig {
    /// ffmpeg binary used for WebM uploads (looked up on PATH if not absolute).
    pub ffmpeg_path: String,
    /// Directory for staged uploads; the system temp dir when unset.
    pub temp_dir: Option<String>,
    /// Longest clip accepted after decoding (seconds). Bounds memory for
    /// compressed uploads that expand far beyond `upload.max_upload_bytes`.
    pub max_duration_seconds: f64,
}

/// Feature extraction parameters.
///
/// Frames are centered and zero padded; the same framing is shared by the
/// pitch tracker, the RMS meter and the MFCC spectrogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Lowest fundamental frequency the pitch tracker searches (Hz).
    pub pitch_min_hz: f64,
    /// Highest fundamental frequency the pitch tracker searches (Hz).
    pub pitch_max_hz: f64,
    /// YIN trough threshold; frames with no trough below it are unvoiced.
    pub yin_threshold: f64,
    /// Analysis frame length in samples.
    pub frame_length: usize,
    /// Distance between frame starts in samples.
    pub hop_length: usize,
    /// FFT size for the MFCC spectrogram.
    pub n_fft: usize,
    /// Mel bands in the MFCC filterbank.
    pub n_mels: usize,
    /// Number of cepstral coefficients kept.
    pub n_mfcc: usize,
}

/// Rule constants for the stress / fatigue labels.
///
/// These are placeholders without calibration data behind them; comparisons
/// against them are strict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Stress is High only when energy is above this...
    pub stress_energy: f64,
    /// ...and pitch is above this (Hz).
    pub stress_pitch_hz: f64,
    /// Fatigue is High when energy is below this.
    pub fatigue_energy: f64,
}

/// Shape of the analysis response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Include the mean MFCC vector in responses.
    pub include_mfcc: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            cors: CorsConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],  // React dev server
                max_age: 3600,
            },
            upload: UploadConfig {
                max_upload_bytes: 25 * 1024 * 1024,
                field_name: "file".to_string(),
            },
            decode: DecodeConfig::default(),
            analysis: AnalysisConfig::default(),
            thresholds: ThresholdConfig::default(),
            response: ResponseConfig { include_mfcc: false },
        }
    }
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            temp_dir: None,
            max_duration_seconds: crate::audio::decoder::DEFAULT_MAX_DURATION_SECONDS,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            pitch_min_hz: 50.0,
            pitch_max_hz: 300.0,
            yin_threshold: 0.1,
            frame_length: 2048,
            hop_length: 512,
            n_fft: 2048,
            n_mels: 128,
            n_mfcc: 20,
        }
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            stress_energy: 0.04,
            stress_pitch_hz: 180.0,
            fatigue_energy: 0.02,
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__HOST=0.0.0.0`: Override server host
    /// - `APP_THRESHOLDS__FATIGUE_ENERGY=0.015`: Override a rule constant
    /// - `APP_CORS__ALLOWED_ORIGINS=https://a.example,https://b.example`: Comma separated list
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - At least one CORS origin and a usable upload limit
    /// - The pitch search range is ordered, below Nyquist and fits in a frame
    /// - Frame, FFT and filterbank sizes are usable
    /// - Rule thresholds are finite and non-negative
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(anyhow::anyhow!("At least one CORS origin must be configured"));
        }

        if self.upload.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.upload.field_name.trim().is_empty() {
            return Err(anyhow::anyhow!("Upload field name cannot be empty"));
        }

        if self.decode.ffmpeg_path.trim().is_empty() {
            return Err(anyhow::anyhow!("ffmpeg path cannot be empty"));
        }

        if !(self.decode.max_duration_seconds.is_finite() && self.decode.max_duration_seconds > 0.0) {
            return Err(anyhow::anyhow!("max_duration_seconds must be a positive number"));
        }

        self.analysis.validate()?;
        self.thresholds.validate()?;

        Ok(())
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// Only the runtime-tunable sections are accepted: `thresholds`, `response`
    /// and `upload`. For example `{"thresholds": {"stress_pitch_hz": 200}}`
    /// changes one rule constant and leaves everything else alone.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        if let Some(thresholds) = partial_config.get("thresholds") {
            if let Some(v) = thresholds.get("stress_energy").and_then(|v| v.as_f64()) {
                self.thresholds.stress_energy = v;
            }
            if let Some(v) = thresholds.get("stress_pitch_hz").and_then(|v| v.as_f64()) {
                self.thresholds.stress_pitch_hz = v;
            }
            if let Some(v) = thresholds.get("fatigue_energy").and_then(|v| v.as_f64()) {
                self.thresholds.fatigue_energy = v;
            }
        }

        if let Some(response) = partial_config.get("response") {
            if let Some(include) = response.get("include_mfcc").and_then(|v| v.as_bool()) {
                self.response.include_mfcc = include;
            }
        }

        if let Some(upload) = partial_config.get("upload") {
            if let Some(max) = upload.get("max_upload_bytes").and_then(|v| v.as_u64()) {
                self.upload.max_upload_bytes = max as usize;
            }
        }

        self.validate()?;
        Ok(())
    }
}

impl AnalysisConfig {
    /// Lag range (in samples) searched by the pitch tracker at `sample_rate`.
    ///
    /// The upper bound is clamped so that the integration window
    /// (`frame_length / 2`) plus the largest lag still fits in one frame.
    pub fn pitch_lag_range(&self, sample_rate: u32) -> (usize, usize) {
        let sr = sample_rate as f64;
        let min_lag = ((sr / self.pitch_max_hz).floor() as usize).max(1);
        let max_lag = ((sr / self.pitch_min_hz).ceil() as usize)
            .min(self.frame_length.saturating_sub(self.frame_length / 2 + 1));
        (min_lag, max_lag)
    }

    fn validate(&self) -> Result<()> {
        let nyquist = crate::audio::TARGET_SAMPLE_RATE as f64 / 2.0;

        if !(self.pitch_min_hz > 0.0 && self.pitch_min_hz < self.pitch_max_hz) {
            return Err(anyhow::anyhow!("Pitch range must satisfy 0 < pitch_min_hz < pitch_max_hz"));
        }
        if self.pitch_max_hz >= nyquist {
            return Err(anyhow::anyhow!("pitch_max_hz must be below {} Hz", nyquist));
        }
        if !(self.yin_threshold > 0.0 && self.yin_threshold < 1.0) {
            return Err(anyhow::anyhow!("yin_threshold must be between 0 and 1"));
        }
        if self.frame_length < 16 || self.hop_length == 0 {
            return Err(anyhow::anyhow!("frame_length must be at least 16 and hop_length non-zero"));
        }

        let (min_lag, max_lag) = self.pitch_lag_range(crate::audio::TARGET_SAMPLE_RATE);
        if min_lag + 2 > max_lag {
            return Err(anyhow::anyhow!(
                "frame_length {} is too short for a {}-{} Hz pitch search",
                self.frame_length, self.pitch_min_hz, self.pitch_max_hz
            ));
        }

        if self.n_fft < 16 {
            return Err(anyhow::anyhow!("n_fft must be at least 16"));
        }
        if self.n_mels == 0 || self.n_mfcc == 0 || self.n_mfcc > self.n_mels {
            return Err(anyhow::anyhow!("Need 0 < n_mfcc <= n_mels"));
        }

        Ok(())
    }
}

impl ThresholdConfig {
    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("stress_energy", self.stress_energy),
            ("stress_pitch_hz", self.stress_pitch_hz),
            ("fatigue_energy", self.fatigue_energy),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(anyhow::anyhow!("Threshold {} must be a finite, non-negative number", name));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.cors.allowed_origins, vec!["http://localhost:3000"]);
        assert_eq!(config.thresholds, ThresholdConfig {
            stress_energy: 0.04,
            stress_pitch_hz: 180.0,
            fatigue_energy: 0.02,
        });
        assert!(!config.response.include_mfcc);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analysis.pitch_min_hz = 400.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.analysis.n_mfcc = 200;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.thresholds.fatigue_energy = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.decode.max_duration_seconds = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_frames_cannot_hold_pitch_search() {
        let mut config = AppConfig::default();
        config.analysis.frame_length = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pitch_lag_range() {
        let analysis = AnalysisConfig::default();
        // 16000 / 300 = 53.3 -> 53, 16000 / 50 = 320
        assert_eq!(analysis.pitch_lag_range(16_000), (53, 320));

        let short = AnalysisConfig { frame_length: 512, ..AnalysisConfig::default() };
        // Window of 256 leaves room for lags up to 255
        assert_eq!(short.pitch_lag_range(16_000), (53, 255));
    }

    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"thresholds": {"stress_pitch_hz": 200.0}, "response": {"include_mfcc": true}}"#;
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.thresholds.stress_pitch_hz, 200.0);
        assert!(config.response.include_mfcc);
        // Other fields should remain unchanged
        assert_eq!(config.thresholds.stress_energy, 0.04);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_config_update_rejects_invalid_values() {
        let mut config = AppConfig::default();
        let json = r#"{"thresholds": {"fatigue_energy": -1.0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
