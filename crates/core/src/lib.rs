pub mod aggregator;
pub mod breaker;
pub mod cache;
pub mod config;
pub mod delivery;
pub mod fetcher;
pub mod metrics;
pub mod provider;
pub mod queue;
pub mod resolver;
pub mod store;
pub mod testing;

pub use aggregator::{AggregateReport, Aggregator, ProviderOutcome, ProviderReport};
pub use breaker::{BreakerRegistry, BreakerState, BreakerStatus, CircuitBreaker};
pub use cache::{cache_key, episode_key, CacheEntry, CacheStats, ContentCache, SourceType};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
    StorageBackend, StorageConfig,
};
pub use delivery::{DeliveryChannel, DeliveryError, FsDeliveryChannel};
pub use fetcher::{FetchError, FetchedArtifact, MediaFetcher, TorrentFileFetcher};
pub use provider::{
    build_registry, JackettProvider, Provider, ProviderError, ProviderRegistry, ProviderTier,
    SearchOptions, SearchResult,
};
pub use queue::{JobQueue, JobRecord, JobStatus};
pub use resolver::{ResolveError, ResolveOutcome, ResolveStatus, Resolver, SeasonOutcome, SeasonRequest};
pub use store::{IndexStore, JsonFileStore, MemoryIndexStore, SqliteIndexStore, StoreError};
