use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pipeline events recorded in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEvent {
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },
    CycleStarted {
        cycle_id: String,
        pending_keywords: usize,
    },
    /// A tick fired while the quota pause was active.
    CycleSkipped {
        paused_until: DateTime<Utc>,
    },
    KeywordStarted {
        cycle_id: String,
        keyword: String,
    },
    KeywordFinished {
        cycle_id: String,
        keyword: String,
        status: String,
        accepted: usize,
        rejected: usize,
    },
    ChannelAccepted {
        cycle_id: String,
        keyword: String,
        channel_id: String,
        url: String,
    },
    ChannelRejected {
        cycle_id: String,
        keyword: String,
        channel_id: String,
        reason: String,
    },
    SinkWriteFailed {
        cycle_id: String,
        keyword: String,
        channel_id: String,
        error: String,
    },
    QuotaExhausted {
        cycle_id: String,
        keyword: Option<String>,
        paused_until: DateTime<Utc>,
    },
    CycleFinished {
        cycle_id: String,
        units_used: u64,
        keywords_processed: usize,
        quota_exhausted: bool,
    },
}

impl JournalEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "service_started",
            Self::ServiceStopped { .. } => "service_stopped",
            Self::CycleStarted { .. } => "cycle_started",
            Self::CycleSkipped { .. } => "cycle_skipped",
            Self::KeywordStarted { .. } => "keyword_started",
            Self::KeywordFinished { .. } => "keyword_finished",
            Self::ChannelAccepted { .. } => "channel_accepted",
            Self::ChannelRejected { .. } => "channel_rejected",
            Self::SinkWriteFailed { .. } => "sink_write_failed",
            Self::QuotaExhausted { .. } => "quota_exhausted",
            Self::CycleFinished { .. } => "cycle_finished",
        }
    }

    pub fn cycle_id(&self) -> Option<&str> {
        match self {
            Self::CycleStarted { cycle_id, .. }
            | Self::KeywordStarted { cycle_id, .. }
            | Self::KeywordFinished { cycle_id, .. }
            | Self::ChannelAccepted { cycle_id, .. }
            | Self::ChannelRejected { cycle_id, .. }
            | Self::SinkWriteFailed { cycle_id, .. }
            | Self::QuotaExhausted { cycle_id, .. }
            | Self::CycleFinished { cycle_id, .. } => Some(cycle_id),
            Self::ServiceStarted { .. }
            | Self::ServiceStopped { .. }
            | Self::CycleSkipped { .. } => None,
        }
    }

    pub fn keyword(&self) -> Option<&str> {
        match self {
            Self::KeywordStarted { keyword, .. }
            | Self::KeywordFinished { keyword, .. }
            | Self::ChannelAccepted { keyword, .. }
            | Self::ChannelRejected { keyword, .. }
            | Self::SinkWriteFailed { keyword, .. } => Some(keyword),
            Self::QuotaExhausted { keyword, .. } => keyword.as_deref(),
            _ => None,
        }
    }
}

/// A persisted journal entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub cycle_id: Option<String>,
    pub keyword: Option<String>,
    pub data: JournalEvent,
}
