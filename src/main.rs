//! # VITA Voice API
//!
//! HTTP service that takes an uploaded voice clip, measures pitch, energy and
//! MFCC, and labels stress and fatigue with simple threshold rules.
//!
//! ## Application Architecture:
//! - **config**: layered configuration (defaults, config.toml, APP_ env vars)
//! - **state**: shared config snapshot and request metrics
//! - **health**: health and metrics endpoints
//! - **middleware**: request logging and metrics collection
//! - **handlers**: analysis upload and runtime config endpoints
//! - **audio**: format detection, decoding and resampling to 16 kHz mono
//! - **analysis**: pitch, energy, MFCC and the stress / fatigue rules
//! - **pipeline**: decode → extract → classify for one clip
//! - **server**: route table, CORS and graceful shutdown
//! - **error**: HTTP error responses

mod analysis;
mod audio;
mod config;
mod error;
mod handlers;
mod health;
mod middleware;
mod pipeline;
mod server;
mod state;

use anyhow::Result;
use crate::config::AppConfig;
use crate::server::ApiServer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing()?;

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting vita-voice-api v{}", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        origins = ?config.cors.allowed_origins,
        max_upload_bytes = config.upload.max_upload_bytes,
        "Configuration loaded"
    );

    ApiServer::new(config).run().await
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` controls verbosity; defaults to
/// `vita_voice_api=debug,actix_web=info`.
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vita_voice_api=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
