use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dedup::DedupError;
use crate::discovery::{ChannelDetails, DiscoveryError, SearchItem};

/// Rendered in place of derived fields when recent uploads were not analyzed.
pub const NOT_ANALYZED: &str = "not analyzed";

pub fn channel_url(channel_id: &str) -> String {
    format!("https://www.youtube.com/channel/{}", channel_id)
}

/// A channel under evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelCandidate {
    pub id: String,
    pub url: String,
    pub title: String,
    pub description: String,
    pub subscriber_count: u64,
    pub language_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads_playlist_id: Option<String>,
}

impl From<SearchItem> for ChannelCandidate {
    fn from(item: SearchItem) -> Self {
        Self {
            url: channel_url(&item.id),
            id: item.id,
            title: item.title,
            description: item.snippet_text,
            subscriber_count: 0,
            language_hint: None,
            uploads_playlist_id: None,
        }
    }
}

impl From<ChannelDetails> for ChannelCandidate {
    fn from(details: ChannelDetails) -> Self {
        Self {
            url: channel_url(&details.id),
            id: details.id,
            title: details.title,
            description: details.description,
            subscriber_count: details.subscriber_count,
            language_hint: details.language_hint,
            uploads_playlist_id: details.uploads_playlist_id,
        }
    }
}

/// Figures derived from a channel's most recent uploads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoSampleSummary {
    pub sampled_count: usize,
    /// Fraction of sampled uploads that are short-form, in `0.0..=1.0`.
    pub shorts_ratio: f64,
    pub latest_published_at: Option<DateTime<Utc>>,
    pub oldest_published_at: Option<DateTime<Utc>>,
    /// Mean over uploads with a known duration.
    pub average_duration_minutes: f64,
    pub longest_duration_minutes: f64,
}

impl VideoSampleSummary {
    pub fn shorts_display(&self) -> String {
        format!("{:.0}%", self.shorts_ratio * 100.0)
    }

    /// Uploads per week across the span covered by the sample.
    pub fn uploads_per_week(&self) -> f64 {
        let (Some(latest), Some(oldest)) = (self.latest_published_at, self.oldest_published_at)
        else {
            return 0.0;
        };
        // Anything shorter than a day counts as one day.
        let span_days = ((latest - oldest).num_seconds() as f64 / 86_400.0).max(1.0);
        self.sampled_count as f64 * 7.0 / span_days
    }

    pub fn frequency_display(&self) -> String {
        format!("{:.1}/week", self.uploads_per_week())
    }

    pub fn duration_display(&self) -> String {
        format!("{:.1} min", self.average_duration_minutes)
    }
}

/// A channel that passed every filter, ready for the result sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedChannelRecord {
    pub channel: ChannelCandidate,
    /// `None` when recent uploads were not analyzed.
    pub summary: Option<VideoSampleSummary>,
    pub contacts: Vec<String>,
    pub accepted_at: DateTime<Utc>,
}

impl AcceptedChannelRecord {
    pub fn status_label(&self) -> &'static str {
        if self.summary.is_some() {
            "accepted"
        } else {
            "accepted (unanalyzed)"
        }
    }

    /// Cells in result-partition column order.
    pub fn to_row(&self) -> Vec<String> {
        let (shorts, frequency, duration) = match &self.summary {
            Some(s) => (
                s.shorts_display(),
                s.frequency_display(),
                s.duration_display(),
            ),
            None => (
                NOT_ANALYZED.to_string(),
                NOT_ANALYZED.to_string(),
                NOT_ANALYZED.to_string(),
            ),
        };

        vec![
            self.channel.title.clone(),
            self.channel.url.clone(),
            self.channel.subscriber_count.to_string(),
            self.channel.description.clone(),
            self.contacts.join(", "),
            self.accepted_at.format("%Y-%m-%d").to_string(),
            shorts,
            frequency,
            duration,
            self.status_label().to_string(),
        ]
    }
}

/// Why a channel was not accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The detail lookup returned nothing for this id.
    NotFound,
    AlreadyWritten,
    Language,
    Subscribers { count: u64 },
    TooManyShorts { ratio: f64 },
    Inactive,
    TooShort,
    NoContacts,
}

impl RejectReason {
    /// Stable label for metrics and the journal.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::NotFound => "not_found",
            RejectReason::AlreadyWritten => "already_written",
            RejectReason::Language => "language",
            RejectReason::Subscribers { .. } => "subscribers",
            RejectReason::TooManyShorts { .. } => "shorts",
            RejectReason::Inactive => "inactive",
            RejectReason::TooShort => "too_short",
            RejectReason::NoContacts => "no_contacts",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Subscribers { count } => write!(f, "subscribers ({})", count),
            RejectReason::TooManyShorts { ratio } => write!(f, "shorts ({:.0}%)", ratio * 100.0),
            other => f.write_str(other.as_str()),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Dedup(#[from] DedupError),
}

impl PipelineError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, PipelineError::Discovery(e) if e.is_quota_exhausted())
    }
}
