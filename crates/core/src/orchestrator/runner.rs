//! Discovery runner implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{FilterConfig, SchedulerConfig};
use crate::contacts::ContactExtractor;
use crate::dedup::DedupRepository;
use crate::discovery::DiscoveryApi;
use crate::journal::{emit_to, JournalEvent, JournalHandle};
use crate::keywords::{Keyword, KeywordQueue};
use crate::metrics;
use crate::pipeline::{ChannelFilters, EnrichmentPipeline, SearchStage};
use crate::quota::QuotaScheduler;
use crate::sheets::ResultSink;

use super::types::{CycleOutcome, CycleSummary, KeywordReport, OrchestratorError};

/// How long `stop` waits for an in-flight cycle before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Collaborators the runner is wired with.
pub struct RunnerDeps {
    pub api: Arc<dyn DiscoveryApi>,
    pub dedup: Arc<dyn DedupRepository>,
    pub sink: Arc<ResultSink>,
    pub contacts: Arc<dyn ContactExtractor>,
    pub quota: Arc<QuotaScheduler>,
    pub journal: Option<JournalHandle>,
}

/// The discovery runner - drives keywords through search and enrichment.
pub struct DiscoveryRunner {
    sink: Arc<ResultSink>,
    quota: Arc<QuotaScheduler>,
    search: SearchStage,
    enrichment: EnrichmentPipeline,
    journal: Option<JournalHandle>,
    max_candidates: usize,

    // Runtime state
    running: AtomicBool,
    cycle_lock: Mutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl DiscoveryRunner {
    pub fn new(scheduler: &SchedulerConfig, filters: &FilterConfig, deps: RunnerDeps) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        let search = SearchStage::new(
            Arc::clone(&deps.api),
            Arc::clone(&deps.dedup),
            Arc::clone(&deps.quota),
            scheduler.page_size,
            filters.target_language.clone(),
        );
        let enrichment = EnrichmentPipeline::new(
            deps.api,
            deps.dedup,
            Arc::clone(&deps.quota),
            Arc::clone(&deps.sink),
            deps.contacts,
            ChannelFilters::new(filters.clone()),
            scheduler.batch_size,
            deps.journal.clone(),
        );

        Self {
            sink: deps.sink,
            quota: deps.quota,
            search,
            enrichment,
            journal: deps.journal,
            max_candidates: scheduler.max_candidates_per_keyword,
            running: AtomicBool::new(false),
            cycle_lock: Mutex::new(()),
            task: Mutex::new(None),
            shutdown_tx,
        }
    }

    pub fn quota(&self) -> &Arc<QuotaScheduler> {
        &self.quota
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the periodic loop. The first cycle is attempted immediately.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Discovery runner already running");
            return;
        }

        info!("Starting discovery runner");

        let runner = Arc::clone(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        let handle = tokio::spawn(async move {
            info!("Cycle loop started");
            let mut delay = Duration::ZERO;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cycle loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(delay) => {
                        if !runner.running.load(Ordering::Relaxed) {
                            break;
                        }
                        match runner.run_cycle_at(Utc::now()).await {
                            Ok(outcome) => debug!(outcome = outcome.label(), "Cycle ended"),
                            Err(e) => {
                                metrics::CYCLES.with_label_values(&["failed"]).inc();
                                error!("Cycle failed: {}", e);
                            }
                        }
                        delay = runner.quota.next_delay(Utc::now());
                        debug!(delay_secs = delay.as_secs(), "Next cycle scheduled");
                    }
                }
            }
            info!("Cycle loop stopped");
        });

        *self.task.lock().await = Some(handle);
        info!("Discovery runner started");
    }

    /// Stop the loop, letting an in-flight cycle finish.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Discovery runner not running");
            return;
        }

        info!("Stopping discovery runner");
        let _ = self.shutdown_tx.send(());

        if let Some(mut handle) = self.task.lock().await.take() {
            if tokio::time::timeout(STOP_TIMEOUT, &mut handle).await.is_err() {
                warn!("Cycle did not finish in time, aborting");
                handle.abort();
            }
        }

        info!("Discovery runner stopped");
    }

    /// Run one cycle as of `now`.
    ///
    /// Returns `Err` only when the cycle could not start, e.g. the keyword
    /// partition is unreadable.
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome, OrchestratorError> {
        let _cycle = self.cycle_lock.lock().await;

        if let Some(paused_until) = self.quota.paused_until().filter(|until| now < *until) {
            info!(paused_until = %paused_until, "Quota pause active, skipping cycle");
            metrics::CYCLES.with_label_values(&["skipped_paused"]).inc();
            emit_to(&self.journal, JournalEvent::CycleSkipped { paused_until }).await;
            return Ok(CycleOutcome::Skipped { paused_until });
        }

        self.quota.begin_cycle(now);
        let started = Instant::now();
        let cycle_id = Uuid::new_v4().to_string();
        let mut queue = KeywordQueue::load(Arc::clone(&self.sink)).await?;
        let pending = queue.remaining();

        info!(cycle_id = %cycle_id, pending_keywords = pending, "Cycle started");
        emit_to(
            &self.journal,
            JournalEvent::CycleStarted {
                cycle_id: cycle_id.clone(),
                pending_keywords: pending,
            },
        )
        .await;

        let mut summary = CycleSummary::new(cycle_id.clone());
        let mut paused_until = None;

        while let Some(keyword) = queue.next_pending() {
            match self.run_keyword(&cycle_id, &mut queue, &keyword, now).await {
                Ok(report) => {
                    summary.add(&report);
                    self.keyword_finished(&cycle_id, &keyword, &queue, &report)
                        .await;
                }
                Err(OrchestratorError::QuotaExhausted(reason)) => {
                    let until = self.quota.trip(detected_at(now, started));
                    warn!(
                        cycle_id = %cycle_id,
                        keyword = %keyword.text,
                        reason = %reason,
                        "Quota exhausted, aborting cycle"
                    );
                    emit_to(
                        &self.journal,
                        JournalEvent::QuotaExhausted {
                            cycle_id: cycle_id.clone(),
                            keyword: Some(keyword.text.clone()),
                            paused_until: until,
                        },
                    )
                    .await;
                    paused_until = Some(until);
                    break;
                }
                Err(e) => {
                    summary.keywords_processed += 1;
                    summary.keywords_failed += 1;
                    warn!(keyword = %keyword.text, error = %e, "Keyword failed");
                    if let Err(mark_err) = queue.mark_error(&keyword, &e.to_string()).await {
                        error!(
                            keyword = %keyword.text,
                            error = %mark_err,
                            "Failed to record keyword error status"
                        );
                    }
                    self.keyword_finished(&cycle_id, &keyword, &queue, &KeywordReport::default())
                        .await;
                }
            }
        }

        summary.units_used = self.quota.units_used_this_cycle();
        info!(
            cycle_id = %cycle_id,
            keywords = summary.keywords_processed,
            accepted = summary.accepted,
            rejected = summary.rejected,
            units_used = summary.units_used,
            "Cycle finished"
        );
        emit_to(
            &self.journal,
            JournalEvent::CycleFinished {
                cycle_id: cycle_id.clone(),
                units_used: summary.units_used,
                keywords_processed: summary.keywords_processed,
                quota_exhausted: paused_until.is_some(),
            },
        )
        .await;

        let outcome = match paused_until {
            Some(paused_until) => CycleOutcome::QuotaExhausted {
                summary,
                paused_until,
            },
            None => CycleOutcome::Completed(summary),
        };
        metrics::CYCLES.with_label_values(&[outcome.label()]).inc();
        Ok(outcome)
    }

    /// One keyword: search, enrich, then `Done` or back to `Pending`.
    async fn run_keyword(
        &self,
        cycle_id: &str,
        queue: &mut KeywordQueue,
        keyword: &Keyword,
        now: DateTime<Utc>,
    ) -> Result<KeywordReport, OrchestratorError> {
        queue.mark_processing(keyword).await?;
        info!(cycle_id = %cycle_id, keyword = %keyword.text, "Processing keyword");
        emit_to(
            &self.journal,
            JournalEvent::KeywordStarted {
                cycle_id: cycle_id.to_string(),
                keyword: keyword.text.clone(),
            },
        )
        .await;

        let mut search = self
            .search
            .collect_candidates(&keyword.text, self.max_candidates)
            .await?;
        debug!(
            keyword = %keyword.text,
            candidates = search.candidates.len(),
            skipped_seen = search.skipped_seen,
            pages = search.pages,
            "Search finished"
        );

        let candidates = search.candidates.len();
        let batch = std::mem::take(&mut search.candidates);
        let enriched = self
            .enrichment
            .process(cycle_id, &keyword.text, batch, now)
            .await?;
        self.search.save_resume_point(&keyword.text, &search)?;

        if search.exhausted {
            queue.mark_done(keyword).await?;
        } else {
            queue.mark_pending(keyword).await?;
        }

        Ok(KeywordReport {
            exhausted: search.exhausted,
            candidates,
            accepted: enriched.accepted.len(),
            rejected: enriched.rejected,
            sink_failures: enriched.sink_failures,
        })
    }

    async fn keyword_finished(
        &self,
        cycle_id: &str,
        keyword: &Keyword,
        queue: &KeywordQueue,
        report: &KeywordReport,
    ) {
        let status = queue
            .keywords()
            .iter()
            .find(|k| k.row == keyword.row)
            .map(|k| k.status.label())
            .unwrap_or_default();

        info!(
            keyword = %keyword.text,
            status = %status,
            accepted = report.accepted,
            rejected = report.rejected,
            "Keyword finished"
        );
        emit_to(
            &self.journal,
            JournalEvent::KeywordFinished {
                cycle_id: cycle_id.to_string(),
                keyword: keyword.text.clone(),
                status,
                accepted: report.accepted,
                rejected: report.rejected,
            },
        )
        .await;
    }
}

/// Wall-clock time at which something was observed during a cycle that
/// started at `now`.
fn detected_at(now: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
    let elapsed =
        chrono::Duration::from_std(started.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
    now + elapsed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contacts::RegexContactExtractor;
    use crate::dedup::{DedupError, SqliteDedupRepository};
    use crate::discovery::DiscoveryError;
    use crate::keywords::KeywordStatus;
    use crate::sheets::{SheetStore, SqliteSheetStore, KEYWORD_HEADER};
    use crate::testing::{fixtures, MockDiscoveryApi};

    struct Harness {
        api: Arc<MockDiscoveryApi>,
        sheets: Arc<SqliteSheetStore>,
        runner: Arc<DiscoveryRunner>,
    }

    async fn harness(keywords: &[&str]) -> Harness {
        harness_with(
            keywords,
            Arc::new(SqliteDedupRepository::in_memory().unwrap()),
        )
        .await
    }

    async fn harness_with(keywords: &[&str], dedup: Arc<dyn DedupRepository>) -> Harness {
        let api = Arc::new(MockDiscoveryApi::new());
        let sheets = Arc::new(SqliteSheetStore::in_memory().unwrap());
        sheets
            .ensure_partition("Keywords", &KEYWORD_HEADER)
            .await
            .unwrap();
        for keyword in keywords {
            sheets
                .append_row("Keywords", vec![keyword.to_string(), String::new()])
                .await
                .unwrap();
        }

        let sink = Arc::new(ResultSink::new(sheets.clone(), "Keywords"));
        let quota = Arc::new(QuotaScheduler::new(
            Duration::from_secs(3600),
            Duration::from_secs(60),
        ));
        let filters = FilterConfig {
            analyze_recent_uploads: false,
            ..Default::default()
        };
        let runner = DiscoveryRunner::new(
            &SchedulerConfig::default(),
            &filters,
            RunnerDeps {
                api: api.clone(),
                dedup,
                sink,
                contacts: Arc::new(RegexContactExtractor::new()),
                quota,
                journal: None,
            },
        );

        Harness {
            api,
            sheets,
            runner: Arc::new(runner),
        }
    }

    async fn status_of(sheets: &SqliteSheetStore, row: usize) -> KeywordStatus {
        let rows = sheets.read_rows("Keywords").await.unwrap();
        KeywordStatus::from_label(rows[row].cell(1))
    }

    #[tokio::test]
    async fn test_cycle_marks_exhausted_keyword_done() {
        let h = harness(&["robotics"]).await;
        h.api
            .add_search_page("robotics", vec![fixtures::search_item("UC1")])
            .await;
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;

        let outcome = tokio_test::assert_ok!(h.runner.run_cycle_at(Utc::now()).await);

        let summary = outcome.summary().unwrap();
        assert_eq!(outcome.label(), "completed");
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.units_used, 101);
        assert_eq!(status_of(&h.sheets, 0).await, KeywordStatus::Done);
    }

    #[tokio::test]
    async fn test_transient_error_marks_keyword_and_continues() {
        let h = harness(&["broken", "robotics"]).await;
        h.api.fail_searches_for("broken").await;
        h.api
            .add_search_page("robotics", vec![fixtures::search_item("UC1")])
            .await;
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;

        let outcome = h.runner.run_cycle_at(Utc::now()).await.unwrap();

        let summary = outcome.summary().unwrap();
        assert_eq!(summary.keywords_failed, 1);
        assert_eq!(summary.accepted, 1);
        assert!(matches!(
            status_of(&h.sheets, 0).await,
            KeywordStatus::Error { .. }
        ));
        assert_eq!(status_of(&h.sheets, 1).await, KeywordStatus::Done);
        assert_eq!(h.api.search_calls().await, 2);
    }

    #[tokio::test]
    async fn test_quota_exhaustion_aborts_cycle_and_pauses() {
        let h = harness(&["first", "second"]).await;
        h.api
            .fail_next(DiscoveryError::QuotaExhausted("quotaExceeded".into()))
            .await;
        let t0 = Utc::now();

        let outcome = h.runner.run_cycle_at(t0).await.unwrap();

        match outcome {
            CycleOutcome::QuotaExhausted { paused_until, .. } => {
                assert!(paused_until >= t0 + chrono::Duration::seconds(3600));
                assert!(paused_until < t0 + chrono::Duration::seconds(3601));
            }
            other => panic!("expected quota exhaustion, got {:?}", other),
        }
        assert_eq!(h.api.search_calls().await, 1);
        assert_eq!(status_of(&h.sheets, 0).await, KeywordStatus::Processing);
        assert_eq!(status_of(&h.sheets, 1).await, KeywordStatus::Pending);
        assert!(h.runner.quota().is_paused(t0));
    }

    #[tokio::test]
    async fn test_paused_cycle_makes_no_calls() {
        let h = harness(&["robotics"]).await;
        let t0 = Utc::now();
        h.runner.quota().trip(t0);

        let outcome = h
            .runner
            .run_cycle_at(t0 + chrono::Duration::seconds(3599))
            .await
            .unwrap();

        assert!(matches!(outcome, CycleOutcome::Skipped { .. }));
        assert_eq!(h.api.call_counts().await.total(), 0);

        let outcome = h
            .runner
            .run_cycle_at(t0 + chrono::Duration::seconds(3600))
            .await
            .unwrap();
        assert_eq!(outcome.label(), "completed");
        assert_eq!(h.api.search_calls().await, 1);
    }

    #[tokio::test]
    async fn test_capped_keyword_returns_to_pending() {
        let h = harness(&["robotics"]).await;
        let items: Vec<_> = (0..60)
            .map(|i| fixtures::search_item(&format!("UC{}", i)))
            .collect();
        h.api
            .add_search_page("robotics", items[..50].to_vec())
            .await;
        h.api
            .add_search_page("robotics", items[50..].to_vec())
            .await;

        h.runner.run_cycle_at(Utc::now()).await.unwrap();
        assert_eq!(status_of(&h.sheets, 0).await, KeywordStatus::Pending);

        let outcome = h.runner.run_cycle_at(Utc::now()).await.unwrap();
        assert_eq!(status_of(&h.sheets, 0).await, KeywordStatus::Done);
        assert_eq!(outcome.summary().unwrap().units_used, 101);

        let searches = h.api.recorded_searches().await;
        assert_eq!(searches.len(), 2);
        assert_eq!(searches[0].continuation_token, None);
        assert_eq!(searches[1].continuation_token.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_cooldown_counts_from_quota_detection() {
        let h = harness(&["robotics"]).await;
        let stall = Duration::from_millis(300);
        h.api.set_latency(stall).await;
        h.api.set_quota_exhausted(true).await;
        let t0 = Utc::now();

        let outcome = h.runner.run_cycle_at(t0).await.unwrap();

        let paused_until = match outcome {
            CycleOutcome::QuotaExhausted { paused_until, .. } => paused_until,
            other => panic!("expected quota exhaustion, got {:?}", other),
        };
        let cooldown = chrono::Duration::seconds(3600);
        assert!(paused_until >= t0 + cooldown + chrono::Duration::from_std(stall).unwrap());

        let detected = Utc::now();
        assert!(h.runner.quota().is_paused(detected + cooldown - chrono::Duration::seconds(1)));
        assert!(h.runner.quota().next_delay(detected) > Duration::from_secs(3599));
    }

    /// Wraps a repository whose first global append fails without touching
    /// the global set.
    struct FailingGlobalOnce {
        inner: SqliteDedupRepository,
        failed: AtomicBool,
    }

    impl DedupRepository for FailingGlobalOnce {
        fn has_seen_for_keyword(&self, keyword: &str, id: &str) -> Result<bool, DedupError> {
            self.inner.has_seen_for_keyword(keyword, id)
        }
        fn record_seen_for_keyword(&self, keyword: &str, id: &str) -> Result<(), DedupError> {
            self.inner.record_seen_for_keyword(keyword, id)
        }
        fn has_global_url(&self, url: &str) -> Result<bool, DedupError> {
            self.inner.has_global_url(url)
        }
        fn record_global_url(&self, url: &str) -> Result<(), DedupError> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(DedupError::Io(std::io::Error::other("disk full")));
            }
            self.inner.record_global_url(url)
        }
        fn replace_global_urls(&self, urls: Vec<String>) -> Result<usize, DedupError> {
            self.inner.replace_global_urls(urls)
        }
        fn global_len(&self) -> usize {
            self.inner.global_len()
        }
        fn resume_token(&self, keyword: &str) -> Result<Option<String>, DedupError> {
            self.inner.resume_token(keyword)
        }
        fn store_resume_token(&self, keyword: &str, token: Option<&str>) -> Result<(), DedupError> {
            self.inner.store_resume_token(keyword, token)
        }
    }

    #[tokio::test]
    async fn test_failed_global_record_does_not_rewrite_channel() {
        let dedup = Arc::new(FailingGlobalOnce {
            inner: SqliteDedupRepository::in_memory().unwrap(),
            failed: AtomicBool::new(false),
        });
        let h = harness_with(&["robotics"], dedup.clone()).await;
        h.api
            .add_search_page("robotics", vec![fixtures::search_item("UC1")])
            .await;
        h.api.add_channel(fixtures::channel("UC1", 5000)).await;

        let outcome = h.runner.run_cycle_at(Utc::now()).await.unwrap();
        assert_eq!(outcome.summary().unwrap().accepted, 1);
        assert_eq!(status_of(&h.sheets, 0).await, KeywordStatus::Done);
        assert!(dedup.has_seen_for_keyword("robotics", "UC1").unwrap());

        // Queue the keyword again; the channel must not be written twice.
        h.sheets
            .update_cell("Keywords", 0, 1, "pending")
            .await
            .unwrap();
        h.runner.run_cycle_at(Utc::now()).await.unwrap();

        let rows = h.sheets.read_rows("robotics").await.unwrap();
        let written = rows
            .iter()
            .filter(|r| r.cell(1) == "https://www.youtube.com/channel/UC1")
            .count();
        assert_eq!(written, 1);
    }

    #[tokio::test]
    async fn test_done_keywords_are_skipped() {
        let h = harness(&["robotics"]).await;
        h.sheets
            .update_cell("Keywords", 0, 1, "done")
            .await
            .unwrap();

        let outcome = h.runner.run_cycle_at(Utc::now()).await.unwrap();

        assert_eq!(outcome.summary().unwrap().keywords_processed, 0);
        assert_eq!(h.api.call_counts().await.total(), 0);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let h = harness(&[]).await;
        h.runner.start().await;
        assert!(h.runner.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;
        h.runner.stop().await;
        assert!(!h.runner.is_running());
    }
}
