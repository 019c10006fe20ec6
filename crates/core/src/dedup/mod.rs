//! Two-scope deduplication state.
//!
//! - The per-keyword scope holds channel ids already judged for one keyword,
//!   whatever the outcome.
//! - The global scope holds channel URLs already written to any result
//!   partition.
//!
//! Both grow monotonically and are written through to durable storage before
//! the caller proceeds.

mod bootstrap;
mod file_store;
mod sqlite;

pub use bootstrap::{bootstrap_global_from_sink, BootstrapError};
pub use file_store::FileDedupRepository;
pub use sqlite::SqliteDedupRepository;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Dedup I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Dedup database error: {0}")]
    Database(String),
}

/// Storage contract for the two dedup scopes.
///
/// `record_*` calls are idempotent and durable on success. A failed
/// `record_global_url` still leaves the URL in the in-memory global set.
pub trait DedupRepository: Send + Sync {
    fn has_seen_for_keyword(&self, keyword: &str, channel_id: &str) -> Result<bool, DedupError>;

    fn record_seen_for_keyword(&self, keyword: &str, channel_id: &str) -> Result<(), DedupError>;

    fn has_global_url(&self, url: &str) -> Result<bool, DedupError>;

    fn record_global_url(&self, url: &str) -> Result<(), DedupError>;

    /// Replace the whole global set. Used by the startup bootstrap.
    fn replace_global_urls(&self, urls: Vec<String>) -> Result<usize, DedupError>;

    /// Number of URLs currently in the global set.
    fn global_len(&self) -> usize;

    /// Continuation token where the keyword's last search stopped.
    fn resume_token(&self, keyword: &str) -> Result<Option<String>, DedupError>;

    /// Save the keyword's continuation token, or clear it with `None`.
    fn store_resume_token(&self, keyword: &str, token: Option<&str>) -> Result<(), DedupError>;
}

/// Normalized form of a keyword used to key the per-keyword scope.
///
/// Case and surrounding/repeated whitespace are not significant.
pub fn normalize_keyword(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable, filesystem-safe name for a keyword's dedup artifact.
pub(crate) fn keyword_file_stem(keyword: &str) -> String {
    let normalized = normalize_keyword(keyword);
    let slug: String = normalized
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .take(40)
        .collect();
    let slug = slug.trim_matches('-');
    let digest = Sha256::digest(normalized.as_bytes());
    let hash: String = digest.iter().take(6).map(|b| format!("{:02x}", b)).collect();

    if slug.is_empty() {
        hash
    } else {
        format!("{}-{}", slug, hash)
    }
}
