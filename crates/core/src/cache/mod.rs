//! Content cache: resolved files keyed by normalized request title, with
//! optional TTL expiry and an in-memory set of in-flight resolutions.

mod content_cache;
mod types;

pub use content_cache::{ActiveGuard, ContentCache};
pub use types::{cache_key, episode_key, CacheEntry, CacheStats, SourceType};
