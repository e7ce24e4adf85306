use crate::{config::AppConfig, error::AppError, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

fn config_view(config: &AppConfig) -> serde_json::Value {
    json!({
        "server": {
            "host": config.server.host,
            "port": config.server.port
        },
        "cors": {
            "allowed_origins": config.cors.allowed_origins,
            "max_age": config.cors.max_age
        },
        "upload": {
            "max_upload_bytes": config.upload.max_upload_bytes,
            "field_name": config.upload.field_name
        },
        "decode": {
            "ffmpeg_path": config.decode.ffmpeg_path,
            "temp_dir": config.decode.temp_dir
        },
        "analysis": config.analysis,
        "thresholds": config.thresholds,
        "response": {
            "include_mfcc": config.response.include_mfcc
        }
    })
}

pub async fn get_config(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let config = state.get_config();

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config_view(&config)
    })))
}

/// Partial runtime update of thresholds, response shape and upload limit.
///
/// Takes effect for the next analysis; in-flight requests keep the snapshot
/// they started with.
pub async fn update_config(
    state: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> Result<HttpResponse, AppError> {
    let json_str = serde_json::to_string(&body.into_inner())?;

    let mut current_config = state.get_config();
    current_config
        .update_from_json(&json_str)
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    state.update_config(current_config.clone())
        .map_err(AppError::ValidationError)?;

    tracing::info!(thresholds = ?current_config.thresholds, "Configuration updated");

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Configuration updated successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "updated_config": config_view(&current_config)
    })))
}
