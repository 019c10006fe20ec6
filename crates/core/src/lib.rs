pub mod config;
pub mod contacts;
pub mod dedup;
pub mod discovery;
pub mod journal;
pub mod keywords;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod quota;
pub mod sheets;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, DedupBackend,
    DiscoveryBackend, SanitizedConfig,
};
pub use contacts::{ContactExtractor, RegexContactExtractor};
pub use dedup::{
    bootstrap_global_from_sink, DedupError, DedupRepository, FileDedupRepository,
    SqliteDedupRepository,
};
pub use discovery::{DiscoveryApi, DiscoveryError, YouTubeClient};
pub use journal::{
    create_journal_system, JournalEvent, JournalFilter, JournalHandle, JournalStore,
    SqliteJournalStore,
};
pub use keywords::{Keyword, KeywordQueue, KeywordStatus};
pub use orchestrator::{CycleOutcome, CycleSummary, DiscoveryRunner, OrchestratorError, RunnerDeps};
pub use quota::{next_delay, PauseFile, QuotaScheduler};
pub use sheets::{ResultSink, SheetStore, SqliteSheetStore};
