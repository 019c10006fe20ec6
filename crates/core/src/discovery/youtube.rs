//! YouTube Data API v3 client.
//!
//! Quota costs are documented per endpoint: `search.list` is 100 units,
//! `channels.list`, `playlistItems.list` and `videos.list` are 1 unit each.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::DiscoveryConfig;

use super::{
    ChannelDetails, DiscoveryApi, DiscoveryError, SearchItem, SearchPage, SearchPageRequest,
    UploadSummary, VideoDuration, MAX_BATCH_IDS,
};

/// Error reasons the API uses when the daily budget is spent.
const QUOTA_REASONS: &[&str] = &["quotaExceeded", "dailyLimitExceeded"];

/// YouTube Data API v3 client.
pub struct YouTubeClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YouTubeClient {
    /// Create a new client from the discovery configuration.
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        if config.api_key.is_empty() {
            return Err(DiscoveryError::NotConfigured(
                "YouTube API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, DiscoveryError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .client
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error(status.as_u16(), &body));
        }

        response.json().await.map_err(|e| {
            DiscoveryError::ParseError(format!("Failed to parse {} response: {}", endpoint, e))
        })
    }
}

/// Map a non-success response to a `DiscoveryError`.
///
/// Only a 403 carrying one of the quota reasons is treated as exhaustion.
fn classify_error(status: u16, body: &str) -> DiscoveryError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let message = parsed
        .as_ref()
        .map(|b| b.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.chars().take(200).collect());

    if status == 403 {
        let quota_hit = parsed
            .as_ref()
            .map(|b| {
                b.error
                    .errors
                    .iter()
                    .any(|e| QUOTA_REASONS.contains(&e.reason.as_str()))
            })
            .unwrap_or(false);
        if quota_hit {
            return DiscoveryError::QuotaExhausted(message);
        }
    }

    DiscoveryError::ApiError { status, message }
}

#[async_trait]
impl DiscoveryApi for YouTubeClient {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn search_channels(
        &self,
        request: &SearchPageRequest,
    ) -> Result<SearchPage, DiscoveryError> {
        debug!(query = %request.query, token = ?request.continuation_token, "YouTube channel search");

        let mut params = vec![
            ("part", "snippet".to_string()),
            ("type", "channel".to_string()),
            ("q", request.query.clone()),
            ("maxResults", request.page_size.min(50).to_string()),
        ];
        if let Some(token) = &request.continuation_token {
            params.push(("pageToken", token.clone()));
        }
        if let Some(lang) = &request.language_hint {
            params.push(("relevanceLanguage", lang.clone()));
        }

        let response: YtSearchResponse = self.get_json("search", &params).await?;
        Ok(response.into())
    }

    async fn lookup_channels(&self, ids: &[String]) -> Result<Vec<ChannelDetails>, DiscoveryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = &ids[..ids.len().min(MAX_BATCH_IDS)];
        debug!(count = ids.len(), "YouTube channel lookup");

        let params = [
            ("part", "snippet,statistics,contentDetails".to_string()),
            ("id", ids.join(",")),
            ("maxResults", MAX_BATCH_IDS.to_string()),
        ];
        let response: YtListResponse<YtChannel> = self.get_json("channels", &params).await?;
        Ok(response.items.into_iter().map(Into::into).collect())
    }

    async fn recent_uploads(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<UploadSummary>, DiscoveryError> {
        debug!(playlist = uploads_playlist_id, "YouTube recent uploads");

        let params = [
            ("part", "snippet,contentDetails".to_string()),
            ("playlistId", uploads_playlist_id.to_string()),
            ("maxResults", max_results.min(50).to_string()),
        ];
        let response: YtListResponse<YtPlaylistItem> =
            self.get_json("playlistItems", &params).await?;

        let mut uploads: Vec<UploadSummary> =
            response.items.into_iter().map(Into::into).collect();
        uploads.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(uploads)
    }

    async fn lookup_durations(&self, ids: &[String]) -> Result<Vec<VideoDuration>, DiscoveryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = &ids[..ids.len().min(MAX_BATCH_IDS)];

        let params = [
            ("part", "contentDetails".to_string()),
            ("id", ids.join(",")),
        ];
        let response: YtListResponse<YtVideo> = self.get_json("videos", &params).await?;

        Ok(response
            .items
            .into_iter()
            .map(|v| VideoDuration {
                duration_seconds: parse_iso8601_duration(&v.content_details.duration)
                    .unwrap_or(0),
                id: v.id,
            })
            .collect())
    }
}

/// Parse an ISO-8601 duration such as `PT1H2M3S` or `P1DT30M` into seconds.
pub fn parse_iso8601_duration(s: &str) -> Option<u64> {
    let rest = s.strip_prefix('P')?;
    let mut total = 0u64;
    let mut number = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            'T' => in_time = true,
            '0'..='9' => number.push(c),
            unit => {
                let value: u64 = number.parse().ok()?;
                number.clear();
                let multiplier = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = value
                    .checked_mul(multiplier)
                    .and_then(|secs| total.checked_add(secs))?;
                saw_component = true;
            }
        }
    }

    if !number.is_empty() || !saw_component {
        return None;
    }
    Some(total)
}

// YouTube API response types

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorReason>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorReason {
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtSearchResponse {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    page_info: Option<YtPageInfo>,
    #[serde(default)]
    items: Vec<YtSearchItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtPageInfo {
    #[serde(default)]
    total_results: u64,
}

#[derive(Debug, Deserialize)]
struct YtSearchItem {
    id: YtSearchId,
    #[serde(default)]
    snippet: Option<YtSnippet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtSearchId {
    #[serde(default)]
    channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtSnippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    default_language: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    resource_id: Option<YtResourceId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtResourceId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YtListResponse<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtChannel {
    id: String,
    #[serde(default)]
    snippet: YtSnippet,
    #[serde(default)]
    statistics: Option<YtStatistics>,
    #[serde(default)]
    content_details: Option<YtChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtStatistics {
    /// Encoded as a decimal string by the API.
    #[serde(default)]
    subscriber_count: Option<String>,
    #[serde(default)]
    hidden_subscriber_count: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtChannelContentDetails {
    #[serde(default)]
    related_playlists: Option<YtRelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct YtRelatedPlaylists {
    #[serde(default)]
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtPlaylistItem {
    #[serde(default)]
    snippet: YtSnippet,
    #[serde(default)]
    content_details: Option<YtPlaylistItemDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtPlaylistItemDetails {
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    video_published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YtVideo {
    id: String,
    content_details: YtVideoContentDetails,
}

#[derive(Debug, Deserialize)]
struct YtVideoContentDetails {
    #[serde(default)]
    duration: String,
}

impl From<YtSearchResponse> for SearchPage {
    fn from(r: YtSearchResponse) -> Self {
        Self {
            items: r
                .items
                .into_iter()
                .filter_map(|item| {
                    let id = item.id.channel_id?;
                    let snippet = item.snippet.unwrap_or_default();
                    Some(SearchItem {
                        id,
                        title: snippet.title,
                        snippet_text: snippet.description,
                    })
                })
                .collect(),
            continuation_token: r.next_page_token.filter(|t| !t.is_empty()),
            estimated_total: r.page_info.map(|p| p.total_results).unwrap_or(0),
        }
    }
}

impl From<YtChannel> for ChannelDetails {
    fn from(c: YtChannel) -> Self {
        let subscriber_count = c
            .statistics
            .filter(|s| !s.hidden_subscriber_count)
            .and_then(|s| s.subscriber_count)
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Self {
            id: c.id,
            title: c.snippet.title,
            description: c.snippet.description,
            subscriber_count,
            language_hint: c.snippet.default_language,
            uploads_playlist_id: c
                .content_details
                .and_then(|d| d.related_playlists)
                .and_then(|p| p.uploads),
        }
    }
}

impl From<YtPlaylistItem> for UploadSummary {
    fn from(item: YtPlaylistItem) -> Self {
        let details = item.content_details;
        let video_id = details
            .as_ref()
            .and_then(|d| d.video_id.clone())
            .or_else(|| item.snippet.resource_id.and_then(|r| r.video_id))
            .unwrap_or_default();
        let published_at = details
            .and_then(|d| d.video_published_at)
            .or(item.snippet.published_at);

        Self {
            video_id,
            title: item.snippet.title,
            description: item.snippet.description,
            published_at,
        }
    }
}
