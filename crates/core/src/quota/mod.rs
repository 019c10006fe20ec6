//! Quota accounting and the pause/resume circuit breaker.
//!
//! The upstream budget is shared by every call type, so a single exhaustion
//! signal pauses the whole pipeline for the configured cooldown window.

mod scheduler;
mod state_file;

pub use scheduler::{next_delay, ApiCall, QuotaScheduler, QuotaState, SchedulerState};
pub use state_file::PauseFile;
