//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Quota accounting (units and calls per upstream call type)
//! - Channel evaluation outcomes
//! - Cycle results and the pause state

use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Quota Metrics
// =============================================================================

/// Estimated quota units spent, by call type.
pub static QUOTA_UNITS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "channelscout_quota_units_total",
            "Estimated upstream quota units spent",
        ),
        &["call"], // "search", "channel_lookup", "recent_uploads", "duration_lookup"
    )
    .unwrap()
});

/// Upstream calls made, by call type.
pub static API_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("channelscout_api_calls_total", "Total upstream API calls"),
        &["call"],
    )
    .unwrap()
});

/// Whether the pipeline is paused on quota exhaustion (1) or not (0).
pub static QUOTA_PAUSED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "channelscout_quota_paused",
        "Whether the pipeline is paused after quota exhaustion",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Channels evaluated, by outcome.
pub static CHANNELS_EVALUATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "channelscout_channels_evaluated_total",
            "Channels run through the filter pipeline",
        ),
        &["outcome"], // "accepted", "rejected_language", "rejected_subscribers", ...
    )
    .unwrap()
});

/// Result rows that failed to write.
pub static SINK_WRITE_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "channelscout_sink_write_failures_total",
        "Accepted channels whose result row could not be written",
    )
    .unwrap()
});

/// Cycles run, by result.
pub static CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("channelscout_cycles_total", "Discovery cycles"),
        &["result"], // "completed", "quota_exhausted", "skipped_paused"
    )
    .unwrap()
});

/// Every core metric, for registration in the binary's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(QUOTA_UNITS.clone()),
        Box::new(API_CALLS.clone()),
        Box::new(QUOTA_PAUSED.clone()),
        Box::new(CHANNELS_EVALUATED.clone()),
        Box::new(SINK_WRITE_FAILURES.clone()),
        Box::new(CYCLES.clone()),
    ]
}
