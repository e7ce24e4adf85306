use crate::audio::{AudioFormat, DecoderRegistry, TARGET_SAMPLE_RATE};
use crate::config::AppConfig;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use std::process;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = state.get_config();
    let uptime_seconds = state.get_uptime_seconds();

    let memory_info = get_memory_info();
    let system_status = get_system_status(&metrics);

    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "service": {
            "name": "vita-voice-api",
            "version": env!("CARGO_PKG_VERSION"),
            "host": config.server.host,
            "port": config.server.port
        },
        "metrics": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "analyses_in_flight": metrics.analyses_in_flight
        },
        "memory": memory_info,
        "pipeline": {
            "sample_rate": TARGET_SAMPLE_RATE,
            "formats": supported_formats(&config),
            "transcoder": config.decode.ffmpeg_path,
            "include_mfcc": config.response.include_mfcc
        },
        "system": system_status
    }))
}

pub async fn detailed_metrics(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let uptime_seconds = state.get_uptime_seconds();

    let mut endpoint_stats = Vec::new();
    for (endpoint, metric) in metrics.endpoint_metrics.iter() {
        endpoint_stats.push(json!({
            "endpoint": endpoint,
            "request_count": metric.request_count,
            "error_count": metric.error_count,
            "error_rate": metric.error_rate(),
            "average_duration_ms": metric.average_duration_ms(),
            "total_duration_ms": metric.total_duration_ms
        }));
    }

    HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds,
        "overall": {
            "total_requests": metrics.request_count,
            "total_errors": metrics.error_count,
            "error_rate": if metrics.request_count > 0 {
                metrics.error_count as f64 / metrics.request_count as f64
            } else {
                0.0
            },
            "requests_per_second": if uptime_seconds > 0 {
                metrics.request_count as f64 / uptime_seconds as f64
            } else {
                0.0
            }
        },
        "analyses": {
            "completed": metrics.analyses.completed,
            "failed": metrics.analyses.failed(),
            "decode_failures": metrics.analyses.decode_failures,
            "analysis_failures": metrics.analyses.analysis_failures,
            "storage_failures": metrics.analyses.storage_failures,
            "in_flight": metrics.analyses_in_flight,
            "average_processing_ms": metrics.analyses.average_processing_ms()
        },
        "endpoints": endpoint_stats,
        "memory": get_memory_info()
    }))
}

fn supported_formats(config: &AppConfig) -> Vec<AudioFormat> {
    let registry = DecoderRegistry::with_defaults(&config.decode);
    [AudioFormat::Wav, AudioFormat::Flac, AudioFormat::Ogg, AudioFormat::Mp3, AudioFormat::WebM]
        .into_iter()
        .filter(|format| registry.supports(*format))
        .collect()
}

fn get_memory_info() -> serde_json::Value {
    let pid = process::id();

    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) {
            let mut vm_rss = 0;
            let mut vm_size = 0;

            for line in status.lines() {
                let bytes = || {
                    line.split_whitespace()
                        .nth(1)
                        .and_then(|kb| kb.parse::<u64>().ok())
                        .unwrap_or(0)
                        * 1024
                };
                if line.starts_with("VmRSS:") {
                    vm_rss = bytes();
                } else if line.starts_with("VmSize:") {
                    vm_size = bytes();
                }
            }

            return json!({
                "resident_memory_bytes": vm_rss,
                "virtual_memory_bytes": vm_size,
                "available": true
            });
        }
    }

    json!({
        "pid": pid,
        "resident_memory_bytes": 0,
        "virtual_memory_bytes": 0,
        "available": false
    })
}

/// Load estimate: analyses in flight against the cores that can run them.
fn get_system_status(metrics: &crate::state::AppMetrics) -> serde_json::Value {
    let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let usage = metrics.analyses_in_flight as f64 / cores as f64;

    let status = if usage > 2.0 {
        "high_load"
    } else if usage > 1.0 {
        "moderate_load"
    } else {
        "normal"
    };

    json!({
        "status": status,
        "cpu_cores": cores,
        "analyses_in_flight": metrics.analyses_in_flight,
        "load_warnings": if usage > 1.0 {
            vec!["More analyses in flight than CPU cores; expect queueing on the blocking pool"]
        } else {
            vec![]
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::config::AppConfig;
    use crate::server::configure_routes;
    use crate::state::AppState;
    use actix_web::{test, web, App};

    #[actix_web::test]
    async fn test_health_endpoints() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new(AppConfig::default())))
                .configure(configure_routes),
        )
        .await;

        for uri in ["/health", "/api/v1/health"] {
            let json: serde_json::Value =
                test::call_and_read_body_json(&app, test::TestRequest::get().uri(uri).to_request()).await;
            assert_eq!(json["status"], "healthy");
            assert_eq!(json["service"]["name"], "vita-voice-api");
            assert_eq!(json["pipeline"]["formats"][4], "webm");
        }
    }

    #[actix_web::test]
    async fn test_metrics_report_analysis_counters() {
        let state = AppState::new(AppConfig::default());
        state.record_analysis_success(12);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let json: serde_json::Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/api/v1/metrics").to_request()).await;
        assert_eq!(json["analyses"]["completed"], 1);
        assert_eq!(json["analyses"]["failed"], 0);
    }
}
