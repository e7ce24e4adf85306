//! # Application State Management
//!
//! Shared state handed to every request handler through `web::Data`.
//!
//! ## What lives here:
//! - **config**: the current `AppConfig`, replaceable at runtime via `PUT /api/v1/config`
//! - **metrics**: request counters, per-route timings and analysis outcomes
//! - **start_time**: for uptime reporting
//!
//! Both mutable parts sit behind `Arc<RwLock<T>>`: many handlers read at once,
//! updates take the write lock briefly. The analysis pipeline itself never
//! touches this state; handlers snapshot the config before running it.

use crate::config::AppConfig;
use crate::pipeline::error::PipelineError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Requests that ended with a 4xx/5xx status
    pub error_count: u64,

    /// Analyses currently running on the blocking pool
    pub analyses_in_flight: u32,

    pub analyses: AnalysisCounters,

    /// Per-route statistics, keyed by e.g. "POST /analyze-voice"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Outcome counts for the voice analysis pipeline.
#[derive(Debug, Default, Clone)]
pub struct AnalysisCounters {
    pub completed: u64,
    pub decode_failures: u64,
    pub analysis_failures: u64,
    pub storage_failures: u64,
    /// Sum of pipeline wall time for completed analyses (milliseconds)
    pub total_processing_ms: u64,
}

/// Detailed performance metrics for a specific API endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

/// Marks one analysis as in flight until dropped.
///
/// Dropping the guard (on success, error or panic unwinding out of the
/// handler) decrements the in-flight gauge.
pub struct InFlightAnalysis {
    metrics: Arc<RwLock<AppMetrics>>,
}

impl Drop for InFlightAnalysis {
    fn drop(&mut self) {
        let mut metrics = write_lock(&self.metrics);
        metrics.analyses_in_flight = metrics.analyses_in_flight.saturating_sub(1);
    }
}

/// Lock helpers that recover the data from a poisoned lock; every write here
/// is a single counter update, so a panic mid-write cannot leave it torn.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// Cloning releases the lock immediately, so a long-running analysis
    /// never blocks a config update.
    pub fn get_config(&self) -> AppConfig {
        read_lock(&self.config).clone()
    }

    /// Replace the configuration after validating it.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        new_config.validate().map_err(|e| e.to_string())?;
        *write_lock(&self.config) = new_config;
        Ok(())
    }

    pub fn increment_request_count(&self) {
        write_lock(&self.metrics).request_count += 1;
    }

    pub fn increment_error_count(&self) {
        write_lock(&self.metrics).error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = write_lock(&self.metrics);
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Count an analysis as running until the returned guard drops.
    pub fn begin_analysis(&self) -> InFlightAnalysis {
        write_lock(&self.metrics).analyses_in_flight += 1;
        InFlightAnalysis { metrics: Arc::clone(&self.metrics) }
    }

    pub fn record_analysis_success(&self, processing_ms: u64) {
        let mut metrics = write_lock(&self.metrics);
        metrics.analyses.completed += 1;
        metrics.analyses.total_processing_ms += processing_ms;
    }

    pub fn record_analysis_failure(&self, err: &PipelineError) {
        let mut metrics = write_lock(&self.metrics);
        match err {
            PipelineError::Decode(_) => metrics.analyses.decode_failures += 1,
            PipelineError::Analysis(_) => metrics.analyses.analysis_failures += 1,
            PipelineError::Io(_) => metrics.analyses.storage_failures += 1,
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        read_lock(&self.metrics).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of requests that failed (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl AnalysisCounters {
    pub fn failed(&self) -> u64 {
        self.decode_failures + self.analysis_failures + self.storage_failures
    }

    pub fn average_processing_ms(&self) -> f64 {
        if self.completed > 0 {
            self.total_processing_ms as f64 / self.completed as f64
        } else {
            0.0
        }
    }
}
