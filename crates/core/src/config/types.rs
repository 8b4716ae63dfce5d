use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::provider::ProviderTier;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
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
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Which backend persists the cache and job indices.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Whole-file JSON indices (`index.json`, `jobs.json`).
    #[default]
    Json,
    /// Per-key rows in a SQLite database.
    Sqlite,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

impl StorageConfig {
    pub fn cache_index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }

    pub fn job_index_path(&self) -> PathBuf {
        self.data_dir.join("jobs.json")
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("reelcache.db")
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

/// Content cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Entry lifetime in hours. Zero or negative means entries never expire.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,
    /// Interval between expiry sweeps, in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_cleanup_interval() -> u64 {
    3600
}

/// Background job queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First retry delay; each following retry doubles it.
    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
    /// Jobs executing at once (1 = serial drain).
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// Re-schedule persisted `queued`/`running` jobs at startup.
    #[serde(default)]
    pub resume_on_boot: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_secs: default_base_delay(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            resume_on_boot: false,
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    60
}

fn default_max_concurrent_jobs() -> usize {
    1
}

/// Per-provider circuit breaker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> u64 {
    60
}

/// Result aggregation configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AggregatorConfig {
    /// Results larger than this are dropped (unknown sizes pass).
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Upper bound on providers queried in parallel for one request.
    #[serde(default = "default_max_concurrent_providers")]
    pub max_concurrent_providers: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            max_concurrent_providers: default_max_concurrent_providers(),
        }
    }
}

/// 3.5 GiB
fn default_max_size_bytes() -> u64 {
    7 * 512 * 1024 * 1024
}

fn default_max_concurrent_providers() -> usize {
    8
}

/// Selection policy configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Seeders required before a direct candidate is fetched without a warning.
    #[serde(default = "default_min_seeders")]
    pub min_seeders: u32,
    /// Vertical resolution floor for episode candidates (720 = 720p).
    #[serde(default = "default_min_episode_quality")]
    pub min_episode_quality: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_seeders: default_min_seeders(),
            min_episode_quality: default_min_episode_quality(),
        }
    }
}

fn default_min_seeders() -> u32 {
    15
}

fn default_min_episode_quality() -> u32 {
    720
}

/// Provider adapter kinds that can be built from configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Jackett,
}

/// One entry of the provider registry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub tier: ProviderTier,
    /// Lower sorts first among results without swarm stats.
    #[serde(default)]
    pub priority: u32,
    /// Required when kind = "jackett"
    #[serde(default)]
    pub jackett: Option<JackettConfig>,
}

fn default_enabled() -> bool {
    true
}

/// Jackett provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JackettConfig {
    /// Jackett server URL (e.g., "http://localhost:9117")
    pub url: String,
    /// Jackett API key
    pub api_key: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Indexer to query; "all" fans out inside Jackett.
    #[serde(default = "default_indexer")]
    pub indexer: String,
}

fn default_timeout() -> u32 {
    30
}

fn default_indexer() -> String {
    "all".to_string()
}

/// Media fetcher configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetcherConfig {
    /// Where fetched artifacts are written before upload (default: system temp dir).
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            work_dir: None,
            timeout_secs: default_fetch_timeout(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    300
}

/// Delivery channel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_deliveries_dir")]
    pub deliveries_dir: PathBuf,
    #[serde(default)]
    pub channel_id: Option<String>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            deliveries_dir: default_deliveries_dir(),
            channel_id: None,
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("data/storage")
}

fn default_deliveries_dir() -> PathBuf {
    PathBuf::from("data/deliveries")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub queue: QueueConfig,
    pub breaker: BreakerConfig,
    pub aggregator: AggregatorConfig,
    pub resolver: ResolverConfig,
    pub providers: Vec<SanitizedProviderConfig>,
    pub fetcher: FetcherConfig,
    pub delivery: DeliveryConfig,
}

/// Sanitized provider entry (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub enabled: bool,
    pub tier: ProviderTier,
    pub priority: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jackett: Option<SanitizedJackettConfig>,
}

/// Sanitized Jackett config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedJackettConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub indexer: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            storage: config.storage.clone(),
            cache: config.cache.clone(),
            queue: config.queue.clone(),
            breaker: config.breaker.clone(),
            aggregator: config.aggregator.clone(),
            resolver: config.resolver.clone(),
            providers: config
                .providers
                .iter()
                .map(|p| SanitizedProviderConfig {
                    name: p.name.clone(),
                    kind: p.kind,
                    enabled: p.enabled,
                    tier: p.tier,
                    priority: p.priority,
                    jackett: p.jackett.as_ref().map(|j| SanitizedJackettConfig {
                        url: j.url.clone(),
                        api_key_configured: !j.api_key.is_empty(),
                        timeout_secs: j.timeout_secs,
                        indexer: j.indexer.clone(),
                    }),
                })
                .collect(),
            fetcher: config.fetcher.clone(),
            delivery: config.delivery.clone(),
        }
    }
}
