use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Where durable state lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory for dedup files and the persisted quota pause.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// SQLite database holding the journal (and the dedup tables when
    /// `dedup_backend = "sqlite"`).
    #[serde(default = "default_db_path")]
    pub database: PathBuf,
    #[serde(default)]
    pub dedup_backend: DedupBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            database: default_db_path(),
            dedup_backend: DedupBackend::default(),
        }
    }
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("channelscout.db")
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DedupBackend {
    /// Newline-delimited files, one per keyword plus one global URL file.
    #[default]
    Files,
    Sqlite,
}

/// Upstream discovery API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub backend: DiscoveryBackend,
    /// API key for the upstream platform.
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryBackend {
    #[default]
    Youtube,
}

fn default_base_url() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_timeout() -> u32 {
    30
}

/// Acceptance criteria applied by the filter pipeline.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterConfig {
    /// Language hint a channel must match (e.g. "ko"). `None` accepts all.
    #[serde(default)]
    pub target_language: Option<String>,
    #[serde(default)]
    pub min_subscribers: Option<u64>,
    #[serde(default)]
    pub max_subscribers: Option<u64>,
    /// Run the recent-uploads analysis stage.
    #[serde(default = "default_true")]
    pub analyze_recent_uploads: bool,
    #[serde(default = "default_sample_size")]
    pub sample_size: u32,
    /// 0 disables the recency check.
    #[serde(default)]
    pub max_age_days: u32,
    /// 0 disables the duration check.
    #[serde(default)]
    pub min_duration_minutes: u32,
    #[serde(default = "default_shorts_threshold")]
    pub shorts_ratio_threshold: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            target_language: None,
            min_subscribers: None,
            max_subscribers: None,
            analyze_recent_uploads: true,
            sample_size: default_sample_size(),
            max_age_days: 0,
            min_duration_minutes: 0,
            shorts_ratio_threshold: default_shorts_threshold(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sample_size() -> u32 {
    10
}

fn default_shorts_threshold() -> f64 {
    0.5
}

/// Cycle timing and per-keyword budgets.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_cycle_interval")]
    pub cycle_interval_secs: u64,
    /// Pause applied after the upstream reports quota exhaustion.
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
    /// Maximum new candidates collected per keyword per cycle.
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_keyword: usize,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Keep the pause deadline across restarts.
    #[serde(default = "default_true")]
    pub persist_pause: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval(),
            cooldown_secs: default_cooldown(),
            max_candidates_per_keyword: default_max_candidates(),
            page_size: default_page_size(),
            batch_size: default_batch_size(),
            persist_pause: true,
        }
    }
}

fn default_cycle_interval() -> u64 {
    3600 // 1 hour
}

fn default_cooldown() -> u64 {
    86_400 // 24 hours
}

fn default_max_candidates() -> usize {
    50
}

fn default_page_size() -> u32 {
    50
}

fn default_batch_size() -> usize {
    50
}

/// Tabular store layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SheetsConfig {
    /// Partition holding the keyword queue.
    #[serde(default = "default_keyword_partition")]
    pub keyword_partition: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            keyword_partition: default_keyword_partition(),
        }
    }
}

fn default_keyword_partition() -> String {
    "Keywords".to_string()
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub discovery: SanitizedDiscoveryConfig,
    pub filters: FilterConfig,
    pub scheduler: SchedulerConfig,
    pub sheets: SheetsConfig,
}

/// Sanitized discovery config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDiscoveryConfig {
    pub backend: String,
    pub base_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            discovery: SanitizedDiscoveryConfig {
                backend: match config.discovery.backend {
                    DiscoveryBackend::Youtube => "youtube".to_string(),
                },
                base_url: config.discovery.base_url.clone(),
                api_key_configured: !config.discovery.api_key.is_empty(),
                timeout_secs: config.discovery.timeout_secs,
            },
            filters: config.filters.clone(),
            scheduler: config.scheduler.clone(),
            sheets: config.sheets.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_config() {
        let toml = r#"
[discovery]
api_key = "key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.discovery.backend, DiscoveryBackend::Youtube);
        assert_eq!(config.discovery.timeout_secs, 30);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.dedup_backend, DedupBackend::Files);
        assert!(config.filters.analyze_recent_uploads);
        assert_eq!(config.filters.sample_size, 10);
        assert_eq!(config.scheduler.cooldown_secs, 86_400);
        assert_eq!(config.scheduler.page_size, 50);
        assert_eq!(config.sheets.keyword_partition, "Keywords");
    }

    #[test]
    fn test_deserialize_missing_discovery_fails() {
        let toml = r#"
[server]
port = 8080
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_filters() {
        let toml = r#"
[discovery]
api_key = "key"

[filters]
target_language = "ko"
min_subscribers = 1000
max_subscribers = 100000
analyze_recent_uploads = false
max_age_days = 30
shorts_ratio_threshold = 0.7
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.filters.target_language.as_deref(), Some("ko"));
        assert_eq!(config.filters.min_subscribers, Some(1000));
        assert_eq!(config.filters.max_subscribers, Some(100_000));
        assert!(!config.filters.analyze_recent_uploads);
        assert_eq!(config.filters.max_age_days, 30);
        assert_eq!(config.filters.min_duration_minutes, 0);
        assert_eq!(config.filters.shorts_ratio_threshold, 0.7);
    }

    #[test]
    fn test_deserialize_sqlite_dedup_backend() {
        let toml = r#"
[discovery]
api_key = "key"

[storage]
dedup_backend = "sqlite"
database = "/data/scout.db"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.storage.dedup_backend, DedupBackend::Sqlite);
        assert_eq!(config.storage.database.to_str().unwrap(), "/data/scout.db");
        assert_eq!(config.storage.state_dir.to_str().unwrap(), "state");
    }

    #[test]
    fn test_sanitized_config_hides_api_key() {
        let toml = r#"
[discovery]
api_key = "secret-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.discovery.api_key_configured);
        assert_eq!(sanitized.discovery.backend, "youtube");

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret-key"));
    }
}
