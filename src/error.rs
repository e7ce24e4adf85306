//! # Error Handling
//!
//! HTTP-facing error type. Pipeline failures, multipart problems and rejected
//! config updates all end up here and leave the server as a JSON body:
//!
//! ```json
//! {
//!   "error": {
//!     "type": "decode_error",
//!     "message": "could not read webm container: ...",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```
//!
//! ## HTTP Status Code Mapping:
//! - BadRequest/ValidationError → 400
//! - PayloadTooLarge → 413
//! - Decode/Analysis → 422 (the upload was received but is not usable audio)
//! - Storage/Internal → 500

use crate::pipeline::error::PipelineError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Custom error types for the application.
///
/// ## Usage Example:
/// ```rust,ignore
/// return Err(AppError::BadRequest("No audio file provided".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (worker pool failures, unexpected states)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Upload exceeded the configured size limit
    PayloadTooLarge { limit: usize },

    /// Upload could not be decoded into audio
    Decode(String),

    /// Decoded audio could not be analysed
    Analysis(String),

    /// Temporary storage for the upload failed
    Storage(String),

    /// User input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::PayloadTooLarge { limit } => write!(f, "Upload exceeds the {} byte limit", limit),
            AppError::Decode(msg) => write!(f, "Decode error: {}", msg),
            AppError::Analysis(msg) => write!(f, "Analysis error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl AppError {
    /// Machine-readable error type used in the JSON body.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Internal(_) => "internal_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge { .. } => "payload_too_large",
            AppError::Decode(_) => "decode_error",
            AppError::Analysis(_) => "analysis_error",
            AppError::Storage(_) => "io_error",
            AppError::ValidationError(_) => "validation_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Decode(_) | AppError::Analysis(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Internal(_) | AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::Decode(msg)
            | AppError::Analysis(msg)
            | AppError::Storage(msg)
            | AppError::ValidationError(msg) => msg.clone(),
            AppError::PayloadTooLarge { .. } => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": self.error_type(),
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Decode(e) => AppError::Decode(e.to_string()),
            PipelineError::Analysis(e) => AppError::Analysis(e.to_string()),
            PipelineError::Io(e) => AppError::Storage(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<actix_multipart::MultipartError> for AppError {
    fn from(err: actix_multipart::MultipartError) -> Self {
        AppError::BadRequest(format!("Multipart error: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Analysis worker failed: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;
