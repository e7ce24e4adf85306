//! # HTTP Server
//!
//! `ApiServer` owns the configuration it was built with; nothing is read
//! from globals. Shutdown is driven by SIGINT / SIGTERM futures raced against
//! the server itself.

use crate::config::{AppConfig, CorsConfig};
use crate::state::AppState;
use crate::{handlers, health, middleware};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Result;
use tracing::{error, info};

/// Route table shared by the server and the handler tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::root_status))
        .route("/analyze-voice", web::post().to(handlers::analyze_voice))
        .route("/health", web::get().to(health::health_check))
        .service(
            web::scope("/api/v1")
                .route("/analyze-voice", web::post().to(handlers::analyze_voice))
                .route("/health", web::get().to(health::health_check))
                .route("/metrics", web::get().to(health::detailed_metrics))
                .route("/config", web::get().to(handlers::get_config))
                .route("/config", web::put().to(handlers::update_config)),
        );
}

/// CORS policy from configuration. `"*"` opens the API to any origin.
fn build_cors(config: &CorsConfig) -> Cors {
    let mut cors = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .expose_headers(vec![middleware::logging::REQUEST_ID_HEADER])
        .max_age(config.max_age);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        // Credentials cannot be combined with a wildcard origin
        cors = cors.allow_any_origin();
    } else {
        for origin in &config.allowed_origins {
            cors = cors.allowed_origin(origin);
        }
        cors = cors.supports_credentials();
    }

    cors
}

pub struct ApiServer {
    config: AppConfig,
}

impl ApiServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Bind and serve until the server stops or a shutdown signal arrives.
    pub async fn run(self) -> Result<()> {
        let bind_addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let cors_config = self.config.cors.clone();
        let app_state = AppState::new(self.config);

        info!("Starting HTTP server on {}", bind_addr);

        let server = HttpServer::new(move || {
            App::new()
                .app_data(web::Data::new(app_state.clone()))
                .wrap(build_cors(&cors_config))
                .wrap(Logger::default())
                .wrap(middleware::MetricsMiddleware)
                .wrap(middleware::RequestLogging)
                .configure(configure_routes)
        })
        .bind(&bind_addr)?
        .run();

        let server_handle = server.handle();
        let server_task = tokio::spawn(server);

        tokio::select! {
            result = server_task => {
                match result {
                    Ok(Err(e)) => error!("Server error: {}", e),
                    Err(e) => error!("Server task error: {}", e),
                    Ok(Ok(())) => {}
                }
            }
            signal = shutdown_signal() => {
                match signal {
                    Ok(name) => info!("Received {}, stopping server...", name),
                    Err(e) => error!("Signal handler failed, stopping server: {}", e),
                }
                server_handle.stop(true).await;
            }
        }

        info!("Server stopped gracefully");
        Ok(())
    }
}

/// Resolves with the name of the first shutdown signal received.
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}
