//! Types for the discovery runner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dedup::DedupError;
use crate::discovery::DiscoveryError;
use crate::pipeline::PipelineError;
use crate::sheets::SheetError;

/// Errors that can occur while running a cycle.
///
/// Only `QuotaExhausted` escapes a single keyword; the others are contained to
/// the keyword being processed.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The upstream quota is spent. Aborts the cycle.
    #[error("quota exhausted: {0}")]
    QuotaExhausted(String),

    /// Transient upstream failure.
    #[error("upstream error: {0}")]
    Upstream(DiscoveryError),

    #[error("tabular store error: {0}")]
    Sheet(#[from] SheetError),

    #[error("dedup store error: {0}")]
    Dedup(#[from] DedupError),
}

impl From<DiscoveryError> for OrchestratorError {
    fn from(e: DiscoveryError) -> Self {
        match e {
            DiscoveryError::QuotaExhausted(reason) => OrchestratorError::QuotaExhausted(reason),
            other => OrchestratorError::Upstream(other),
        }
    }
}

impl From<PipelineError> for OrchestratorError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Discovery(e) => e.into(),
            PipelineError::Dedup(e) => OrchestratorError::Dedup(e),
        }
    }
}

/// What happened to one keyword during a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordReport {
    /// Search ran out of results; the keyword is now `Done`.
    pub exhausted: bool,
    pub candidates: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub sink_failures: usize,
}

/// Totals for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle_id: String,
    pub keywords_processed: usize,
    pub keywords_done: usize,
    pub keywords_failed: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub sink_failures: usize,
    pub units_used: u64,
}

impl CycleSummary {
    pub fn new(cycle_id: impl Into<String>) -> Self {
        Self {
            cycle_id: cycle_id.into(),
            ..Default::default()
        }
    }

    pub(crate) fn add(&mut self, report: &KeywordReport) {
        self.keywords_processed += 1;
        if report.exhausted {
            self.keywords_done += 1;
        }
        self.accepted += report.accepted;
        self.rejected += report.rejected;
        self.sink_failures += report.sink_failures;
    }
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The quota pause was still active; no upstream call was made.
    Skipped { paused_until: DateTime<Utc> },
    Completed(CycleSummary),
    /// The cycle was cut short and the pipeline paused.
    QuotaExhausted {
        summary: CycleSummary,
        paused_until: DateTime<Utc>,
    },
}

impl CycleOutcome {
    pub fn summary(&self) -> Option<&CycleSummary> {
        match self {
            CycleOutcome::Skipped { .. } => None,
            CycleOutcome::Completed(summary) | CycleOutcome::QuotaExhausted { summary, .. } => {
                Some(summary)
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::Skipped { .. } => "skipped_paused",
            CycleOutcome::Completed(_) => "completed",
            CycleOutcome::QuotaExhausted { .. } => "quota_exhausted",
        }
    }
}
