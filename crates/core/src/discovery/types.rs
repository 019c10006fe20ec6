//! Request/response DTOs for the upstream discovery API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum ids accepted by a single batched lookup.
pub const MAX_BATCH_IDS: usize = 50;

/// One page of a keyword search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPageRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,
    /// At most 50.
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchItem {
    /// Channel id.
    pub id: String,
    pub title: String,
    pub snippet_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<SearchItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
    pub estimated_total: u64,
}

/// Channel details returned by the batched lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDetails {
    pub id: String,
    pub title: String,
    pub description: String,
    /// 0 when the channel hides its subscriber count.
    pub subscriber_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hint: Option<String>,
    /// Handle to the channel's upload list, used to sample recent uploads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads_playlist_id: Option<String>,
}

/// A recent upload, as listed in a channel's upload list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub video_id: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoDuration {
    pub id: String,
    pub duration_seconds: u64,
}

/// Errors that can occur when calling the upstream API.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The shared quota budget is spent. Distinct from every transient failure.
    #[error("Upstream quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("Upstream connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Upstream API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse upstream response: {0}")]
    ParseError(String),

    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

impl DiscoveryError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, DiscoveryError::QuotaExhausted(_))
    }
}

impl From<reqwest::Error> for DiscoveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DiscoveryError::Timeout
        } else if e.is_connect() {
            DiscoveryError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            DiscoveryError::ParseError(e.to_string())
        } else {
            DiscoveryError::ApiError {
                status: e.status().map(|s| s.as_u16()).unwrap_or(0),
                message: e.to_string(),
            }
        }
    }
}

/// Trait for upstream discovery backends.
///
/// Implementations make exactly one upstream request per method call; quota
/// accounting is done by the caller.
#[async_trait]
pub trait DiscoveryApi: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Fetch one page of channel search results.
    async fn search_channels(&self, request: &SearchPageRequest)
        -> Result<SearchPage, DiscoveryError>;

    /// Look up details for up to [`MAX_BATCH_IDS`] channels.
    async fn lookup_channels(&self, ids: &[String]) -> Result<Vec<ChannelDetails>, DiscoveryError>;

    /// List the most recent uploads of a channel, newest first.
    async fn recent_uploads(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<UploadSummary>, DiscoveryError>;

    /// Look up durations for up to [`MAX_BATCH_IDS`] videos.
    async fn lookup_durations(&self, ids: &[String]) -> Result<Vec<VideoDuration>, DiscoveryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exhausted_is_distinct() {
        assert!(DiscoveryError::QuotaExhausted("daily".into()).is_quota_exhausted());
        assert!(!DiscoveryError::Timeout.is_quota_exhausted());
        assert!(!DiscoveryError::ApiError {
            status: 403,
            message: "forbidden".into()
        }
        .is_quota_exhausted());
    }

    #[test]
    fn test_search_request_skips_empty_token() {
        let request = SearchPageRequest {
            query: "robotics".to_string(),
            language_hint: None,
            page_size: 50,
            continuation_token: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("continuation_token"));
        assert!(!json.contains("language_hint"));
    }

    #[test]
    fn test_error_display() {
        let err = DiscoveryError::ApiError {
            status: 500,
            message: "backend".to_string(),
        };
        assert_eq!(err.to_string(), "Upstream API error: 500 - backend");
    }
}
