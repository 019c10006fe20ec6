//! Paginated keyword search.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::dedup::DedupRepository;
use crate::discovery::{DiscoveryApi, DiscoveryError, SearchPageRequest};
use crate::quota::{ApiCall, QuotaScheduler};

use super::{ChannelCandidate, PipelineError};

/// Result of collecting candidates for one keyword.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<ChannelCandidate>,
    /// True when the upstream ran out of results, false when the cap stopped
    /// pagination first.
    pub exhausted: bool,
    pub pages: usize,
    /// Hits dropped because they were already judged for this keyword.
    pub skipped_seen: usize,
    /// Token of the first page the next search should fetch. `None` with
    /// `exhausted == false` means page one.
    pub resume_token: Option<String>,
}

pub struct SearchStage {
    api: Arc<dyn DiscoveryApi>,
    dedup: Arc<dyn DedupRepository>,
    quota: Arc<QuotaScheduler>,
    page_size: u32,
    language_hint: Option<String>,
}

impl SearchStage {
    pub fn new(
        api: Arc<dyn DiscoveryApi>,
        dedup: Arc<dyn DedupRepository>,
        quota: Arc<QuotaScheduler>,
        page_size: u32,
        language_hint: Option<String>,
    ) -> Self {
        Self {
            api,
            dedup,
            quota,
            page_size,
            language_hint,
        }
    }

    /// Page through search results until `cap` new candidates are collected
    /// or the upstream has nothing more.
    ///
    /// Starts from the keyword's saved continuation token, if any. A saved
    /// token the upstream rejects is dropped and the search restarts at page
    /// one.
    pub async fn collect_candidates(
        &self,
        keyword: &str,
        cap: usize,
    ) -> Result<SearchOutcome, PipelineError> {
        let mut outcome = SearchOutcome::default();
        let mut queued: HashSet<String> = HashSet::new();
        let mut token = self.dedup.resume_token(keyword)?;
        let mut may_restart = token.is_some();
        let mut stopped_mid_page = None;

        if token.is_some() {
            debug!(keyword = %keyword, "Resuming search from saved token");
        }

        while outcome.candidates.len() < cap {
            let request = SearchPageRequest {
                query: keyword.to_string(),
                language_hint: self.language_hint.clone(),
                page_size: self.page_size,
                continuation_token: token.take(),
            };

            self.quota.charge(ApiCall::Search);
            let page = match self.api.search_channels(&request).await {
                Ok(page) => page,
                Err(DiscoveryError::ApiError { status: 400, message }) if may_restart => {
                    warn!(
                        keyword = %keyword,
                        error = %message,
                        "Saved continuation token rejected, restarting from page one"
                    );
                    may_restart = false;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            may_restart = false;
            outcome.pages += 1;

            debug!(
                keyword = %keyword,
                page = outcome.pages,
                items = page.items.len(),
                estimated_total = page.estimated_total,
                "Fetched search page"
            );

            if page.items.is_empty() {
                outcome.exhausted = true;
                break;
            }

            let mut items = page.items.into_iter();
            for item in items.by_ref() {
                if !queued.insert(item.id.clone()) {
                    continue;
                }
                if self.dedup.has_seen_for_keyword(keyword, &item.id)? {
                    outcome.skipped_seen += 1;
                    continue;
                }
                outcome.candidates.push(ChannelCandidate::from(item));
                if outcome.candidates.len() >= cap {
                    break;
                }
            }

            if items.next().is_some() {
                // Cap hit inside this page; its remaining hits come next time.
                stopped_mid_page = Some(request.continuation_token);
                break;
            }

            match page.continuation_token {
                Some(next) => token = Some(next),
                None => {
                    outcome.exhausted = true;
                    break;
                }
            }
        }

        outcome.resume_token = match stopped_mid_page {
            _ if outcome.exhausted => None,
            Some(current) => current,
            None => token,
        };
        Ok(outcome)
    }

    /// Persist where the keyword's next search starts. Called once the
    /// outcome's candidates have all been judged.
    pub fn save_resume_point(
        &self,
        keyword: &str,
        outcome: &SearchOutcome,
    ) -> Result<(), PipelineError> {
        self.dedup
            .store_resume_token(keyword, outcome.resume_token.as_deref())?;
        Ok(())
    }
}
