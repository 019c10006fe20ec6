//! Mock upstream discovery API for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::discovery::{
    ChannelDetails, DiscoveryApi, DiscoveryError, SearchItem, SearchPage, SearchPageRequest,
    UploadSummary, VideoDuration,
};

/// Per-method call counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub search: usize,
    pub channel_lookup: usize,
    pub recent_uploads: usize,
    pub duration_lookup: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.search + self.channel_lookup + self.recent_uploads + self.duration_lookup
    }
}

/// Mock implementation of the DiscoveryApi trait.
///
/// Provides controllable behavior for testing:
/// - Paged search results per query
/// - Channel details, upload lists and durations
/// - Call counts and recorded search requests for assertions
/// - One-shot errors, per-query failures and a persistent quota-exhausted mode
/// - A fixed latency applied before every response
///
/// Search pages are served in insertion order. Page `n` carries the
/// continuation token `"n+1"` while further pages exist. A token that is not
/// a page number is rejected with a 400.
#[derive(Default)]
pub struct MockDiscoveryApi {
    pages: Arc<RwLock<HashMap<String, Vec<Vec<SearchItem>>>>>,
    channels: Arc<RwLock<HashMap<String, ChannelDetails>>>,
    uploads: Arc<RwLock<HashMap<String, Vec<UploadSummary>>>>,
    durations: Arc<RwLock<HashMap<String, u64>>>,
    searches: Arc<RwLock<Vec<SearchPageRequest>>>,
    counts: Arc<RwLock<CallCounts>>,
    next_error: Arc<RwLock<Option<DiscoveryError>>>,
    failing_queries: Arc<RwLock<HashSet<String>>>,
    quota_exhausted: Arc<RwLock<bool>>,
    latency: Arc<RwLock<Duration>>,
}

impl std::fmt::Debug for MockDiscoveryApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDiscoveryApi").finish_non_exhaustive()
    }
}

impl MockDiscoveryApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a search page for `query`.
    pub async fn add_search_page(&self, query: &str, items: Vec<SearchItem>) {
        self.pages
            .write()
            .await
            .entry(query.to_string())
            .or_default()
            .push(items);
    }

    pub async fn add_channel(&self, details: ChannelDetails) {
        self.channels
            .write()
            .await
            .insert(details.id.clone(), details);
    }

    /// Uploads for a playlist, newest first.
    pub async fn set_uploads(&self, playlist_id: &str, uploads: Vec<UploadSummary>) {
        self.uploads
            .write()
            .await
            .insert(playlist_id.to_string(), uploads);
    }

    pub async fn set_duration(&self, video_id: &str, seconds: u64) {
        self.durations
            .write()
            .await
            .insert(video_id.to_string(), seconds);
    }

    /// The next call of any kind fails with `error`.
    pub async fn fail_next(&self, error: DiscoveryError) {
        *self.next_error.write().await = Some(error);
    }

    /// Every search for `query` fails with a transient API error.
    pub async fn fail_searches_for(&self, query: &str) {
        self.failing_queries.write().await.insert(query.to_string());
    }

    /// While set, every call reports quota exhaustion.
    pub async fn set_quota_exhausted(&self, exhausted: bool) {
        *self.quota_exhausted.write().await = exhausted;
    }

    /// Every call waits `latency` before answering (or failing).
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    pub async fn call_counts(&self) -> CallCounts {
        *self.counts.read().await
    }

    pub async fn search_calls(&self) -> usize {
        self.counts.read().await.search
    }

    pub async fn recorded_searches(&self) -> Vec<SearchPageRequest> {
        self.searches.read().await.clone()
    }

    async fn check_failure(&self) -> Result<(), DiscoveryError> {
        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if *self.quota_exhausted.read().await {
            return Err(DiscoveryError::QuotaExhausted("quotaExceeded".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DiscoveryApi for MockDiscoveryApi {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search_channels(
        &self,
        request: &SearchPageRequest,
    ) -> Result<SearchPage, DiscoveryError> {
        self.counts.write().await.search += 1;
        self.searches.write().await.push(request.clone());
        self.check_failure().await?;

        if self.failing_queries.read().await.contains(&request.query) {
            return Err(DiscoveryError::ApiError {
                status: 500,
                message: "backendError".to_string(),
            });
        }

        let pages = self.pages.read().await;
        let Some(query_pages) = pages.get(&request.query) else {
            return Ok(SearchPage::default());
        };
        let index: usize = match request.continuation_token.as_deref() {
            None => 0,
            Some(token) => token.parse().map_err(|_| DiscoveryError::ApiError {
                status: 400,
                message: "invalidPageToken".to_string(),
            })?,
        };

        let items = query_pages.get(index).cloned().unwrap_or_default();
        let continuation_token = if index + 1 < query_pages.len() {
            Some((index + 1).to_string())
        } else {
            None
        };
        let estimated_total = query_pages.iter().map(|p| p.len() as u64).sum();

        Ok(SearchPage {
            items,
            continuation_token,
            estimated_total,
        })
    }

    async fn lookup_channels(&self, ids: &[String]) -> Result<Vec<ChannelDetails>, DiscoveryError> {
        self.counts.write().await.channel_lookup += 1;
        self.check_failure().await?;

        let channels = self.channels.read().await;
        Ok(ids.iter().filter_map(|id| channels.get(id).cloned()).collect())
    }

    async fn recent_uploads(
        &self,
        uploads_playlist_id: &str,
        max_results: u32,
    ) -> Result<Vec<UploadSummary>, DiscoveryError> {
        self.counts.write().await.recent_uploads += 1;
        self.check_failure().await?;

        let uploads = self.uploads.read().await;
        Ok(uploads
            .get(uploads_playlist_id)
            .map(|u| u.iter().take(max_results as usize).cloned().collect())
            .unwrap_or_default())
    }

    async fn lookup_durations(&self, ids: &[String]) -> Result<Vec<VideoDuration>, DiscoveryError> {
        self.counts.write().await.duration_lookup += 1;
        self.check_failure().await?;

        let durations = self.durations.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| {
                durations.get(id).map(|secs| VideoDuration {
                    id: id.clone(),
                    duration_seconds: *secs,
                })
            })
            .collect())
    }
}
