//! # Voice Analysis Endpoint
//!
//! `POST /analyze-voice` (also mounted under `/api/v1`).
//!
//! ## Request:
//! Multipart form data with one audio file in the field named `file`
//! (configurable via `upload.field_name`).
//!
//! ## Response:
//! ```json
//! {
//!   "pitch": 212.4,
//!   "energy": 0.051,
//!   "stress_level": "High",
//!   "fatigue_level": "Low",
//!   "voiced_frames": 58,
//!   "duration_seconds": 2.0
//! }
//! ```
//! `mfcc` (20 floats) is added when `response.include_mfcc` is enabled.

use crate::analysis::{FatigueLevel, StressLevel};
use crate::audio::{AudioClip, AudioFormat};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::pipeline::error::{DecodeError, PipelineError};
use crate::pipeline::{VoiceAnalysis, VoiceFeaturePipeline};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::stream::StreamExt;
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info, warn, Span};

#[derive(Debug, Serialize)]
pub struct AnalyzeVoiceResponse {
    pub pitch: f64,
    pub energy: f64,
    pub stress_level: StressLevel,
    pub fatigue_level: FatigueLevel,
    pub voiced_frames: usize,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mfcc: Option<Vec<f64>>,
}

impl AnalyzeVoiceResponse {
    fn from_analysis(analysis: VoiceAnalysis, include_mfcc: bool) -> Self {
        let VoiceAnalysis { features, classification, .. } = analysis;
        Self {
            pitch: features.pitch,
            energy: features.energy,
            stress_level: classification.stress_level,
            fatigue_level: classification.fatigue_level,
            voiced_frames: features.voiced_frames,
            duration_seconds: features.duration_seconds,
            mfcc: include_mfcc.then_some(features.mfcc),
        }
    }
}

/// The audio part of a multipart upload.
struct Upload {
    data: Vec<u8>,
    filename: Option<String>,
    content_type: Option<String>,
}

/// `GET /`: liveness banner for the browser client.
pub async fn root_status() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "VITA-AI Voice API Running" }))
}

pub async fn analyze_voice(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    let config = state.get_config();
    let upload = read_upload(payload, &config.upload.field_name, config.upload.max_upload_bytes).await?;

    let detected = AudioFormat::detect(upload.content_type.as_deref(), upload.filename.as_deref(), &upload.data);
    let format = match detected {
        Some(format) => format,
        None => {
            let declared = upload
                .content_type
                .or(upload.filename)
                .unwrap_or_else(|| "unrecognised bytes".to_string());
            let err = PipelineError::from(DecodeError::UnsupportedFormat(declared));
            warn!(error = %err, "Rejecting upload");
            state.record_analysis_failure(&err);
            return Err(err.into());
        }
    };

    info!(
        format = %format,
        size_bytes = upload.data.len(),
        filename = upload.filename.as_deref().unwrap_or("unknown"),
        "Analysing uploaded clip"
    );

    let include_mfcc = config.response.include_mfcc;
    let clip = AudioClip::new(upload.data, format);
    let started = Instant::now();

    let outcome = {
        let _in_flight = state.begin_analysis();
        // The blocking pool thread does not inherit the request span
        let span = Span::current();
        web::block(move || run_pipeline(&config, &clip, &span)).await?
    };

    match outcome {
        Ok(analysis) => {
            state.record_analysis_success(started.elapsed().as_millis() as u64);
            Ok(HttpResponse::Ok().json(AnalyzeVoiceResponse::from_analysis(analysis, include_mfcc)))
        }
        Err(err) => {
            warn!(format = %format, error = %err, "Voice analysis failed");
            state.record_analysis_failure(&err);
            Err(err.into())
        }
    }
}

/// Run one analysis with `span` entered, so the pipeline's stage logs carry
/// the request id.
fn run_pipeline(config: &AppConfig, clip: &AudioClip, span: &Span) -> Result<VoiceAnalysis, PipelineError> {
    span.in_scope(|| VoiceFeaturePipeline::from_config(config).analyze(clip))
}

/// Pull the audio field out of the multipart stream, enforcing the size cap
/// while the bytes arrive.
async fn read_upload(mut payload: Multipart, field_name: &str, max_bytes: usize) -> AppResult<Upload> {
    while let Some(item) = payload.next().await {
        let mut field = item?;

        let is_audio = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map_or(false, |name| name == field_name);
        if !is_audio {
            debug!(field = ?field.name(), "Skipping multipart field");
            continue;
        }

        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk?;
            if data.len() + chunk.len() > max_bytes {
                return Err(AppError::PayloadTooLarge { limit: max_bytes });
            }
            data.extend_from_slice(&chunk);
        }

        return Ok(Upload { data, filename, content_type });
    }

    Err(AppError::BadRequest(format!("No audio file provided in field '{}'", field_name)))
}

#[cfg(test)]
mod tests {
    use super::run_pipeline;
    use crate::audio::decoder::tests::{wav_bytes, with_declared_rate};
    use crate::audio::{AudioClip, AudioFormat};
    use crate::config::AppConfig;
    use crate::server::configure_routes;
    use crate::state::AppState;
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use std::sync::{Arc, Mutex};

    const BOUNDARY: &str = "vita-test-boundary";

    fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                field, filename, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(path: &str, body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri(path)
            .insert_header(("content-type", format!("multipart/form-data; boundary={}", BOUNDARY)))
            .set_payload(body)
    }

    fn tone_wav(freq: f32, rms: f32, seconds: f32) -> Vec<u8> {
        let amplitude = rms * 2f32.sqrt();
        let n = (16_000.0 * seconds) as usize;
        let samples: Vec<f32> = (0..n)
            .map(|i| amplitude * (2.0 * std::f32::consts::PI * freq * i as f32 / 16_000.0).sin())
            .collect();
        wav_bytes(&samples, 16_000, 1)
    }

    #[actix_web::test]
    async fn test_root_status() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_routes),
        )
        .await;

        let resp: serde_json::Value = test::call_and_read_body_json(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp["status"], "VITA-AI Voice API Running");
    }

    #[actix_web::test]
    async fn test_analyze_voice_success() {
        let state = AppState::new(AppConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body("file", "clip.wav", "audio/wav", &tone_wav(220.0, 0.05, 1.0));
        let resp = test::call_service(&app, upload_request("/analyze-voice", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let json: serde_json::Value = test::read_body_json(resp).await;
        let pitch = json["pitch"].as_f64().unwrap();
        assert!((pitch - 220.0).abs() < 5.0, "pitch = {}", pitch);
        assert_eq!(json["stress_level"], "High");
        assert_eq!(json["fatigue_level"], "Low");
        assert!(json["voiced_frames"].as_u64().unwrap() > 0);
        assert!(json.get("mfcc").is_none());

        assert_eq!(state.get_metrics_snapshot().analyses.completed, 1);
    }

    #[actix_web::test]
    async fn test_analyze_voice_includes_mfcc_when_enabled() {
        let mut config = AppConfig::default();
        config.response.include_mfcc = true;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(config)))
                .configure(configure_routes),
        )
        .await;

        // Octet-stream content type falls back to the filename extension
        let body = multipart_body("file", "quiet.wav", "application/octet-stream", &tone_wav(120.0, 0.01, 0.5));
        let json: serde_json::Value =
            test::call_and_read_body_json(&app, upload_request("/api/v1/analyze-voice", body).to_request()).await;

        assert_eq!(json["fatigue_level"], "High");
        assert_eq!(json["mfcc"].as_array().unwrap().len(), 20);
    }

    #[actix_web::test]
    async fn test_missing_file_field_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body("audio", "clip.wav", "audio/wav", &tone_wav(220.0, 0.05, 0.1));
        let resp = test::call_service(&app, upload_request("/analyze-voice", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["error"]["type"], "bad_request");
    }

    #[actix_web::test]
    async fn test_unsupported_upload_is_unprocessable() {
        let state = AppState::new(AppConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body("file", "notes.txt", "text/plain", b"definitely not audio");
        let resp = test::call_service(&app, upload_request("/analyze-voice", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let json: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(json["error"]["type"], "decode_error");
        assert_eq!(state.get_metrics_snapshot().analyses.decode_failures, 1);
    }

    #[actix_web::test]
    async fn test_corrupt_wav_is_unprocessable() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body("file", "broken.wav", "audio/wav", b"RIFF\x00\x00\x00\x00WAVEjunk");
        let resp = test::call_service(&app, upload_request("/analyze-voice", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn test_malformed_header_rates_are_unprocessable() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_routes),
        )
        .await;

        for rate in [0, 1] {
            let wav = with_declared_rate(tone_wav(200.0, 0.05, 0.125), rate);
            let body = multipart_body("file", "clip.wav", "audio/wav", &wav);
            let resp = test::call_service(&app, upload_request("/analyze-voice", body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY, "declared rate {}", rate);

            let json: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(json["error"]["type"], "decode_error");
        }
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[::core::prelude::v1::test]
    fn test_pipeline_logs_carry_request_span() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();

        let clip = AudioClip::new(tone_wav(220.0, 0.05, 0.5), AudioFormat::Wav);
        tracing::subscriber::with_default(subscriber, || {
            // Created but never entered here, as on a blocking pool thread
            let span = tracing::info_span!("request", request_id = "req-4711");
            run_pipeline(&AppConfig::default(), &clip, &span).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|line| line.contains("Voice analysis complete"))
            .unwrap_or_else(|| panic!("no completion event in:\n{}", output));
        assert!(line.contains("req-4711"), "{}", line);
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_rejected() {
        let mut config = AppConfig::default();
        config.upload.max_upload_bytes = 1024;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(config)))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body("file", "clip.wav", "audio/wav", &tone_wav(220.0, 0.05, 0.5));
        let resp = test::call_service(&app, upload_request("/analyze-voice", body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
