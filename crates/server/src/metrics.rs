//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the channelscout daemon:
//! - HTTP request metrics (latency, counts)
//! - Runner status (collected dynamically)
//! - Core pipeline metrics, registered from `channelscout_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "channelscout_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("channelscout_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

// =============================================================================
// Runner Metrics
// =============================================================================

/// Whether the cycle loop is running (1) or not (0).
pub static RUNNER_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "channelscout_runner_running",
        "Whether the discovery cycle loop is running",
    )
    .unwrap()
});

/// Estimated quota units spent in the current cycle.
pub static CYCLE_QUOTA_UNITS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "channelscout_cycle_quota_units",
        "Estimated quota units spent in the current cycle",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(RUNNER_RUNNING.clone())).unwrap();
    registry
        .register(Box::new(CYCLE_QUOTA_UNITS.clone()))
        .unwrap();

    for metric in channelscout_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges derived from the runner before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let runner = state.runner();
    RUNNER_RUNNING.set(i64::from(runner.is_running()));
    CYCLE_QUOTA_UNITS.set(runner.quota().units_used_this_cycle() as i64);
}
