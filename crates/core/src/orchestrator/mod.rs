//! Discovery runner: drives keywords through the pipeline on a periodic tick.
//!
//! - **Gating**: a cycle only starts while the quota scheduler is `Running`
//! - **Single flight**: one keyword, and one upstream call, at a time
//! - **Containment**: quota exhaustion aborts the cycle, anything else fails
//!   only the current keyword

mod runner;
mod types;

pub use runner::{DiscoveryRunner, RunnerDeps};
pub use types::{CycleOutcome, CycleSummary, KeywordReport, OrchestratorError};
