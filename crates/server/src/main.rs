mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use channelscout_core::{
    bootstrap_global_from_sink, create_journal_system, load_config, validate_config,
    DedupBackend, DedupRepository, DiscoveryApi, DiscoveryBackend, DiscoveryRunner,
    FileDedupRepository, JournalEvent, JournalStore, PauseFile, QuotaScheduler,
    RegexContactExtractor, ResultSink, RunnerDeps, SheetStore, SqliteDedupRepository,
    SqliteJournalStore, SqliteSheetStore, YouTubeClient,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the journal event channel
const JOURNAL_BUFFER_SIZE: usize = 1000;

/// File under the state dir holding the quota pause deadline
const PAUSE_FILE: &str = "quota_pause.json";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("CHANNELSCOUT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("State directory: {:?}", config.storage.state_dir);
    info!("Database path: {:?}", config.storage.database);

    // Compute config hash for the journal
    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = &config_hash[..16];

    let state_dir = &config.storage.state_dir;
    std::fs::create_dir_all(state_dir)
        .with_context(|| format!("Failed to create state directory {:?}", state_dir))?;

    // Journal
    let journal_store: Arc<dyn JournalStore> = Arc::new(
        SqliteJournalStore::new(&config.storage.database)
            .context("Failed to create journal store")?,
    );
    let (journal, journal_writer) = create_journal_system(journal_store, JOURNAL_BUFFER_SIZE);
    let writer_handle = tokio::spawn(journal_writer.run());
    info!("Journal initialized");

    // Tabular store and result sink
    let sheets: Arc<dyn SheetStore> = Arc::new(
        SqliteSheetStore::new(&config.storage.database).context("Failed to open tabular store")?,
    );
    let sink = Arc::new(ResultSink::new(sheets, config.sheets.keyword_partition.clone()));

    // Dedup state
    let dedup: Arc<dyn DedupRepository> = match config.storage.dedup_backend {
        DedupBackend::Files => Arc::new(
            FileDedupRepository::open(&state_dir.join("dedup"))
                .context("Failed to open dedup files")?,
        ),
        DedupBackend::Sqlite => Arc::new(
            SqliteDedupRepository::new(&config.storage.database)
                .context("Failed to open dedup database")?,
        ),
    };
    let known = bootstrap_global_from_sink(dedup.as_ref(), &sink)
        .await
        .context("Failed to rebuild global dedup set")?;
    info!("Global dedup set rebuilt with {} URLs", known);

    // Quota scheduler
    let mut quota = QuotaScheduler::new(
        Duration::from_secs(config.scheduler.cooldown_secs),
        Duration::from_secs(config.scheduler.cycle_interval_secs),
    );
    if config.scheduler.persist_pause {
        quota = quota.with_pause_file(PauseFile::new(state_dir.join(PAUSE_FILE)));
    }

    // Upstream client
    let api: Arc<dyn DiscoveryApi> = match config.discovery.backend {
        DiscoveryBackend::Youtube => Arc::new(
            YouTubeClient::new(&config.discovery).context("Failed to create YouTube client")?,
        ),
    };
    info!("Using discovery backend: {}", api.name());

    let runner = Arc::new(DiscoveryRunner::new(
        &config.scheduler,
        &config.filters,
        RunnerDeps {
            api,
            dedup,
            sink,
            contacts: Arc::new(RegexContactExtractor::new()),
            quota: Arc::new(quota),
            journal: Some(journal.clone()),
        },
    ));

    journal
        .emit(JournalEvent::ServiceStarted {
            version: VERSION.to_string(),
            config_hash: config_hash_short.to_string(),
        })
        .await;

    runner.start().await;

    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&runner)));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    runner.stop().await;

    journal
        .emit(JournalEvent::ServiceStopped {
            reason: "graceful_shutdown".to_string(),
        })
        .await;

    // The runner holds journal handles; the writer exits once every handle
    // is gone.
    drop(runner);
    drop(journal);

    let _ = writer_handle.await;
    info!("Journal writer stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
