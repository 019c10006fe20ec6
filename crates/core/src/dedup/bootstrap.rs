use tracing::info;

use crate::sheets::{ResultSink, SheetError};

use super::{DedupError, DedupRepository};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Sheet(#[from] SheetError),
    #[error(transparent)]
    Dedup(#[from] DedupError),
}

/// Rebuild the global URL set from every result partition in the sink.
///
/// Returns the number of distinct URLs loaded.
pub async fn bootstrap_global_from_sink(
    repo: &dyn DedupRepository,
    sink: &ResultSink,
) -> Result<usize, BootstrapError> {
    let urls = sink.existing_urls().await?;
    let count = repo.replace_global_urls(urls)?;
    info!(count, "Bootstrapped global URL set from result partitions");
    Ok(count)
}
