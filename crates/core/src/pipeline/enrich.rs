//! Batched enrichment and the ordered filter chain.
//!
//! Filters run cheapest first and stop at the first failure:
//! global URL, language, subscribers, recent-upload analysis, contacts.
//! Each judged channel is recorded for its keyword as soon as the outcome is
//! known.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::contacts::ContactExtractor;
use crate::dedup::DedupRepository;
use crate::discovery::{DiscoveryApi, MAX_BATCH_IDS};
use crate::journal::{emit_to, JournalEvent, JournalHandle};
use crate::metrics;
use crate::quota::{ApiCall, QuotaScheduler};
use crate::sheets::ResultSink;

use super::{
    summarize_sample, AcceptedChannelRecord, ChannelCandidate, ChannelFilters, PipelineError,
    RejectReason, VideoSampleSummary,
};

/// Outcome counts for one batch run.
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    pub accepted: Vec<AcceptedChannelRecord>,
    pub rejected: usize,
    /// Accepted channels whose result row could not be written.
    pub sink_failures: usize,
}

enum Verdict {
    Accept(AcceptedChannelRecord),
    Reject(RejectReason),
}

pub struct EnrichmentPipeline {
    api: Arc<dyn DiscoveryApi>,
    dedup: Arc<dyn DedupRepository>,
    quota: Arc<QuotaScheduler>,
    sink: Arc<ResultSink>,
    contacts: Arc<dyn ContactExtractor>,
    filters: ChannelFilters,
    batch_size: usize,
    journal: Option<JournalHandle>,
}

impl EnrichmentPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api: Arc<dyn DiscoveryApi>,
        dedup: Arc<dyn DedupRepository>,
        quota: Arc<QuotaScheduler>,
        sink: Arc<ResultSink>,
        contacts: Arc<dyn ContactExtractor>,
        filters: ChannelFilters,
        batch_size: usize,
        journal: Option<JournalHandle>,
    ) -> Self {
        Self {
            api,
            dedup,
            quota,
            sink,
            contacts,
            filters,
            batch_size: batch_size.clamp(1, MAX_BATCH_IDS),
            journal,
        }
    }

    /// Enrich and judge `candidates` for `keyword`.
    ///
    /// Only upstream and dedup failures are returned. A failed result write is
    /// counted in the report and the run continues.
    pub async fn process(
        &self,
        cycle_id: &str,
        keyword: &str,
        candidates: Vec<ChannelCandidate>,
        now: DateTime<Utc>,
    ) -> Result<EnrichmentReport, PipelineError> {
        let mut report = EnrichmentReport::default();

        for batch in candidates.chunks(self.batch_size) {
            let ids: Vec<String> = batch.iter().map(|c| c.id.clone()).collect();

            self.quota.charge(ApiCall::ChannelLookup);
            let mut details: HashMap<String, ChannelCandidate> = self
                .api
                .lookup_channels(&ids)
                .await?
                .into_iter()
                .map(|d| (d.id.clone(), ChannelCandidate::from(d)))
                .collect();

            debug!(
                keyword = %keyword,
                requested = ids.len(),
                found = details.len(),
                "Looked up channel batch"
            );

            for id in &ids {
                let verdict = match details.remove(id) {
                    Some(channel) => self.evaluate(channel, now).await?,
                    None => Verdict::Reject(RejectReason::NotFound),
                };

                match verdict {
                    Verdict::Reject(reason) => {
                        self.dedup.record_seen_for_keyword(keyword, id)?;
                        self.on_rejected(cycle_id, keyword, id, &reason).await;
                        report.rejected += 1;
                    }
                    Verdict::Accept(record) => {
                        if self.write_accepted(cycle_id, keyword, &record).await? {
                            report.accepted.push(record);
                        } else {
                            report.sink_failures += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    async fn evaluate(
        &self,
        channel: ChannelCandidate,
        now: DateTime<Utc>,
    ) -> Result<Verdict, PipelineError> {
        if self.dedup.has_global_url(&channel.url)? {
            return Ok(Verdict::Reject(RejectReason::AlreadyWritten));
        }
        if let Err(reason) = self.filters.check_language(&channel) {
            return Ok(Verdict::Reject(reason));
        }
        if let Err(reason) = self.filters.check_subscribers(&channel) {
            return Ok(Verdict::Reject(reason));
        }

        let summary = if self.filters.analyze_recent_uploads() {
            let summary = self.analyze(&channel).await?;
            if let Err(reason) = self.filters.check_activity(&summary, now) {
                debug!(
                    channel_id = %channel.id,
                    shorts_ratio = summary.shorts_ratio,
                    sampled = summary.sampled_count,
                    "Recent uploads rejected"
                );
                return Ok(Verdict::Reject(reason));
            }
            Some(summary)
        } else {
            None
        };

        let contacts = self.contacts.extract(&channel.description);
        if contacts.is_empty() {
            return Ok(Verdict::Reject(RejectReason::NoContacts));
        }

        Ok(Verdict::Accept(AcceptedChannelRecord {
            channel,
            summary,
            contacts,
            accepted_at: now,
        }))
    }

    /// Sample the channel's newest uploads and their durations.
    async fn analyze(&self, channel: &ChannelCandidate) -> Result<VideoSampleSummary, PipelineError> {
        let Some(playlist) = &channel.uploads_playlist_id else {
            return Ok(VideoSampleSummary::default());
        };

        self.quota.charge(ApiCall::RecentUploads);
        let uploads = self
            .api
            .recent_uploads(playlist, self.filters.sample_size())
            .await?;
        if uploads.is_empty() {
            return Ok(VideoSampleSummary::default());
        }

        let video_ids: Vec<String> = uploads
            .iter()
            .take(MAX_BATCH_IDS)
            .map(|u| u.video_id.clone())
            .collect();
        self.quota.charge(ApiCall::DurationLookup);
        let durations = self.api.lookup_durations(&video_ids).await?;

        Ok(summarize_sample(&uploads, &durations))
    }

    /// Write the row, then record the URL globally and the id for the
    /// keyword. Returns false when the sink rejected the write.
    async fn write_accepted(
        &self,
        cycle_id: &str,
        keyword: &str,
        record: &AcceptedChannelRecord,
    ) -> Result<bool, PipelineError> {
        let channel = &record.channel;

        match self.sink.append_accepted(keyword, record).await {
            Ok(()) => {
                // The row exists now; the keyword record must follow even if
                // the global one fails.
                if let Err(e) = self.dedup.record_global_url(&channel.url) {
                    error!(
                        keyword = %keyword,
                        url = %channel.url,
                        error = %e,
                        "Failed to persist global URL"
                    );
                }
                self.dedup.record_seen_for_keyword(keyword, &channel.id)?;
                metrics::CHANNELS_EVALUATED
                    .with_label_values(&["accepted"])
                    .inc();
                info!(
                    keyword = %keyword,
                    channel_id = %channel.id,
                    subscribers = channel.subscriber_count,
                    "Channel accepted"
                );
                emit_to(
                    &self.journal,
                    JournalEvent::ChannelAccepted {
                        cycle_id: cycle_id.to_string(),
                        keyword: keyword.to_string(),
                        channel_id: channel.id.clone(),
                        url: channel.url.clone(),
                    },
                )
                .await;
                Ok(true)
            }
            Err(e) => {
                // Not recorded globally, so a later run may still write it.
                self.dedup.record_seen_for_keyword(keyword, &channel.id)?;
                metrics::SINK_WRITE_FAILURES.inc();
                error!(
                    keyword = %keyword,
                    channel_id = %channel.id,
                    error = %e,
                    "Failed to write accepted channel"
                );
                emit_to(
                    &self.journal,
                    JournalEvent::SinkWriteFailed {
                        cycle_id: cycle_id.to_string(),
                        keyword: keyword.to_string(),
                        channel_id: channel.id.clone(),
                        error: e.to_string(),
                    },
                )
                .await;
                Ok(false)
            }
        }
    }

    async fn on_rejected(
        &self,
        cycle_id: &str,
        keyword: &str,
        channel_id: &str,
        reason: &RejectReason,
    ) {
        let outcome = format!("rejected_{}", reason.as_str());
        metrics::CHANNELS_EVALUATED
            .with_label_values(&[outcome.as_str()])
            .inc();
        debug!(
            keyword = %keyword,
            channel_id = %channel_id,
            reason = %reason,
            "Channel rejected"
        );
        emit_to(
            &self.journal,
            JournalEvent::ChannelRejected {
                cycle_id: cycle_id.to_string(),
                keyword: keyword.to_string(),
                channel_id: channel_id.to_string(),
                reason: reason.to_string(),
            },
        )
        .await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::config::FilterConfig;
    use crate::contacts::RegexContactExtractor;
    use crate::dedup::SqliteDedupRepository;
    use crate::discovery::DiscoveryError;
    use crate::sheets::{SheetError, SheetRow, SheetStore, SqliteSheetStore};
    use crate::testing::{fixtures, MockDiscoveryApi};

    struct Harness {
        api: Arc<MockDiscoveryApi>,
        dedup: Arc<SqliteDedupRepository>,
        quota: Arc<QuotaScheduler>,
        sheets: Arc<dyn SheetStore>,
        pipeline: EnrichmentPipeline,
    }

    fn harness_with_store(config: FilterConfig, sheets: Arc<dyn SheetStore>) -> Harness {
        let api = Arc::new(MockDiscoveryApi::new());
        let dedup = Arc::new(SqliteDedupRepository::in_memory().unwrap());
        let quota = Arc::new(QuotaScheduler::new(
            Duration::from_secs(86_400),
            Duration::from_secs(3600),
        ));
        let sink = Arc::new(ResultSink::new(sheets.clone(), "Keywords"));
        let pipeline = EnrichmentPipeline::new(
            api.clone(),
            dedup.clone(),
            quota.clone(),
            sink,
            Arc::new(RegexContactExtractor::new()),
            ChannelFilters::new(config),
            50,
            None,
        );
        Harness {
            api,
            dedup,
            quota,
            sheets,
            pipeline,
        }
    }

    fn harness(config: FilterConfig) -> Harness {
        harness_with_store(config, Arc::new(SqliteSheetStore::in_memory().unwrap()))
    }

    fn unanalyzed() -> FilterConfig {
        FilterConfig {
            analyze_recent_uploads: false,
            min_subscribers: Some(1000),
            max_subscribers: Some(100_000),
            ..Default::default()
        }
    }

    fn candidate(id: &str) -> ChannelCandidate {
        ChannelCandidate::from(fixtures::search_item(id))
    }

    #[tokio::test]
    async fn test_accepts_and_records_both_scopes() {
        let h = harness(unanalyzed());
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;

        let report = h
            .pipeline
            .process("c1", "robotics", vec![candidate("UC1")], Utc::now())
            .await
            .unwrap();

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].status_label(), "accepted (unanalyzed)");
        assert!(h.dedup.has_global_url("https://www.youtube.com/channel/UC1").unwrap());
        assert!(h.dedup.has_seen_for_keyword("robotics", "UC1").unwrap());

        let rows = h.sheets.read_rows("robotics").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cell(9), "accepted (unanalyzed)");
        assert_eq!(h.quota.units_used_this_cycle(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_reject_skips_upload_sample() {
        let mut config = unanalyzed();
        config.analyze_recent_uploads = true;
        let h = harness(config);
        h.api.add_channel(fixtures::channel("UC1", 50)).await;

        let report = h
            .pipeline
            .process("c1", "robotics", vec![candidate("UC1")], Utc::now())
            .await
            .unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected, 1);
        let counts = h.api.call_counts().await;
        assert_eq!(counts.recent_uploads, 0);
        assert_eq!(counts.duration_lookup, 0);
        assert!(h.dedup.has_seen_for_keyword("robotics", "UC1").unwrap());
        assert_eq!(h.dedup.global_len(), 0);
    }

    #[tokio::test]
    async fn test_shorts_heavy_channel_rejected() {
        let now = Utc::now();
        let mut config = unanalyzed();
        config.analyze_recent_uploads = true;
        config.shorts_ratio_threshold = 0.7;
        let h = harness(config);
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;
        h.api
            .set_uploads(
                &fixtures::uploads_playlist("UC1"),
                fixtures::upload_series("UC1", 10, 8, now),
            )
            .await;

        let report = h
            .pipeline
            .process("c1", "robotics", vec![candidate("UC1")], now)
            .await
            .unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected, 1);
        let counts = h.api.call_counts().await;
        assert_eq!(counts.recent_uploads, 1);
        assert_eq!(counts.duration_lookup, 1);
        assert_eq!(h.quota.units_used_this_cycle(), 3);
    }

    #[tokio::test]
    async fn test_analyzed_channel_carries_summary() {
        let now = Utc::now();
        let mut config = unanalyzed();
        config.analyze_recent_uploads = true;
        config.shorts_ratio_threshold = 0.9;
        let h = harness(config);
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;
        h.api
            .set_uploads(
                &fixtures::uploads_playlist("UC1"),
                fixtures::upload_series("UC1", 10, 8, now),
            )
            .await;

        let report = h
            .pipeline
            .process("c1", "robotics", vec![candidate("UC1")], now)
            .await
            .unwrap();

        assert_eq!(report.accepted.len(), 1);
        let summary = report.accepted[0].summary.as_ref().unwrap();
        assert!((summary.shorts_ratio - 0.8).abs() < 1e-9);
        assert_eq!(report.accepted[0].to_row()[6], "80%");
    }

    #[tokio::test]
    async fn test_missing_channel_and_no_contacts_rejected() {
        let h = harness(unanalyzed());
        let mut quiet = fixtures::channel("UC2", 5000);
        quiet.description = "Just robots".to_string();
        h.api.add_channel(quiet).await;

        let report = h
            .pipeline
            .process(
                "c1",
                "robotics",
                vec![candidate("UC1"), candidate("UC2")],
                Utc::now(),
            )
            .await
            .unwrap();

        assert_eq!(report.rejected, 2);
        assert!(h.dedup.has_seen_for_keyword("robotics", "UC1").unwrap());
        assert!(h.dedup.has_seen_for_keyword("robotics", "UC2").unwrap());
    }

    #[tokio::test]
    async fn test_already_written_url_is_skipped() {
        let h = harness(unanalyzed());
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;
        h.dedup
            .record_global_url("https://www.youtube.com/channel/UC1")
            .unwrap();

        let report = h
            .pipeline
            .process("c1", "cooking", vec![candidate("UC1")], Utc::now())
            .await
            .unwrap();

        assert!(report.accepted.is_empty());
        assert!(h.sheets.read_rows("cooking").await.is_err());
    }

    #[tokio::test]
    async fn test_batches_respect_batch_size() {
        let h = harness(unanalyzed());
        let candidates: Vec<_> = (0..120).map(|i| candidate(&format!("UC{}", i))).collect();

        h.pipeline
            .process("c1", "robotics", candidates, Utc::now())
            .await
            .unwrap();

        assert_eq!(h.api.call_counts().await.channel_lookup, 3);
    }

    #[tokio::test]
    async fn test_quota_error_leaves_channel_unrecorded() {
        let h = harness(unanalyzed());
        h.api
            .fail_next(DiscoveryError::QuotaExhausted("quotaExceeded".into()))
            .await;

        let err = h
            .pipeline
            .process("c1", "robotics", vec![candidate("UC1")], Utc::now())
            .await
            .unwrap_err();

        assert!(err.is_quota_exhausted());
        assert!(!h.dedup.has_seen_for_keyword("robotics", "UC1").unwrap());
    }

    /// Store that accepts keyword reads but rejects every append.
    struct BrokenStore;

    #[async_trait]
    impl SheetStore for BrokenStore {
        async fn list_partitions(&self) -> Result<Vec<String>, SheetError> {
            Ok(Vec::new())
        }

        async fn ensure_partition(&self, _name: &str, _header: &[&str]) -> Result<bool, SheetError> {
            Ok(false)
        }

        async fn read_rows(&self, _name: &str) -> Result<Vec<SheetRow>, SheetError> {
            Ok(Vec::new())
        }

        async fn append_row(&self, _name: &str, _cells: Vec<String>) -> Result<(), SheetError> {
            Err(SheetError::Unavailable("quota".to_string()))
        }

        async fn update_cell(
            &self,
            _name: &str,
            _row: usize,
            _column: usize,
            _value: &str,
        ) -> Result<(), SheetError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_failure_records_keyword_scope_only() {
        let h = harness_with_store(unanalyzed(), Arc::new(BrokenStore));
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;

        let report = h
            .pipeline
            .process("c1", "robotics", vec![candidate("UC1")], Utc::now())
            .await
            .unwrap();

        assert!(report.accepted.is_empty());
        assert_eq!(report.sink_failures, 1);
        assert!(h.dedup.has_seen_for_keyword("robotics", "UC1").unwrap());
        assert!(!h.dedup.has_global_url("https://www.youtube.com/channel/UC1").unwrap());
    }
}
