use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::metrics;

use super::PauseFile;

/// Upstream call types and their fixed quota cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    Search,
    ChannelLookup,
    RecentUploads,
    DurationLookup,
}

impl ApiCall {
    /// Documented cost in quota units, independent of batch size.
    pub fn cost(&self) -> u64 {
        match self {
            ApiCall::Search => 100,
            ApiCall::ChannelLookup | ApiCall::RecentUploads | ApiCall::DurationLookup => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApiCall::Search => "search",
            ApiCall::ChannelLookup => "channel_lookup",
            ApiCall::RecentUploads => "recent_uploads",
            ApiCall::DurationLookup => "duration_lookup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Running,
    Paused,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaState {
    /// `None` when not paused.
    pub paused_until: Option<DateTime<Utc>>,
    /// Observability only; never used to block calls.
    pub estimated_units_used_this_cycle: u64,
}

/// Delay before the next cycle check.
///
/// While paused this is the remaining cooldown, otherwise the regular
/// interval.
pub fn next_delay(
    now: DateTime<Utc>,
    paused_until: Option<DateTime<Utc>>,
    interval: Duration,
) -> Duration {
    match paused_until {
        Some(until) if until > now => (until - now).to_std().unwrap_or(interval),
        _ => interval,
    }
}

/// Tracks quota use and gates cycles on the pause deadline.
pub struct QuotaScheduler {
    state: Mutex<QuotaState>,
    cooldown: Duration,
    interval: Duration,
    pause_file: Option<PauseFile>,
}

impl QuotaScheduler {
    /// Create a scheduler starting in `Running`.
    pub fn new(cooldown: Duration, interval: Duration) -> Self {
        Self {
            state: Mutex::new(QuotaState::default()),
            cooldown,
            interval,
            pause_file: None,
        }
    }

    /// Persist the pause deadline to `pause_file` and restore any deadline it
    /// already holds.
    pub fn with_pause_file(self, pause_file: PauseFile) -> Self {
        let restored = pause_file.load();
        if let Some(until) = restored {
            info!(paused_until = %until, "Restored quota pause from disk");
            metrics::QUOTA_PAUSED.set(1);
        }
        {
            let mut state = self.lock();
            state.paused_until = restored;
        }
        Self {
            pause_file: Some(pause_file),
            ..self
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QuotaState> {
        // A poisoned lock still holds a consistent QuotaState.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn state_at(&self, now: DateTime<Utc>) -> SchedulerState {
        if self.is_paused(now) {
            SchedulerState::Paused
        } else {
            SchedulerState::Running
        }
    }

    pub fn is_paused(&self, now: DateTime<Utc>) -> bool {
        matches!(self.lock().paused_until, Some(until) if now < until)
    }

    pub fn snapshot(&self) -> QuotaState {
        self.lock().clone()
    }

    pub fn paused_until(&self) -> Option<DateTime<Utc>> {
        self.lock().paused_until
    }

    /// Reset the per-cycle counter. Clears an elapsed pause.
    pub fn begin_cycle(&self, now: DateTime<Utc>) {
        let mut state = self.lock();
        state.estimated_units_used_this_cycle = 0;
        if matches!(state.paused_until, Some(until) if until <= now) {
            state.paused_until = None;
            metrics::QUOTA_PAUSED.set(0);
            drop(state);
            self.persist(None);
        }
    }

    /// Record one upstream call.
    pub fn charge(&self, call: ApiCall) {
        let cost = call.cost();
        self.lock().estimated_units_used_this_cycle += cost;
        metrics::API_CALLS.with_label_values(&[call.as_str()]).inc();
        metrics::QUOTA_UNITS
            .with_label_values(&[call.as_str()])
            .inc_by(cost);
    }

    pub fn units_used_this_cycle(&self) -> u64 {
        self.lock().estimated_units_used_this_cycle
    }

    /// Enter `Paused` until `now + cooldown`. Returns the deadline.
    pub fn trip(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let cooldown = chrono::Duration::from_std(self.cooldown)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let until = now + cooldown;
        {
            let mut state = self.lock();
            state.paused_until = Some(until);
        }
        metrics::QUOTA_PAUSED.set(1);
        warn!(paused_until = %until, "Quota exhausted, pausing pipeline");
        self.persist(Some(until));
        until
    }

    pub fn next_delay(&self, now: DateTime<Utc>) -> Duration {
        next_delay(now, self.paused_until(), self.interval)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn persist(&self, until: Option<DateTime<Utc>>) {
        if let Some(file) = &self.pause_file {
            if let Err(e) = file.store(until) {
                tracing::error!("Failed to persist quota pause: {}", e);
            }
        }
    }
}
