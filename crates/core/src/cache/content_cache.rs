use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::types::{cache_key, CacheEntry, CacheStats};
use crate::config::CacheConfig;
use crate::metrics;
use crate::store::{IndexStore, StoreError};

type ActiveSet = Arc<Mutex<HashSet<String>>>;

fn lock_active(active: &ActiveSet) -> MutexGuard<'_, HashSet<String>> {
    // A set of strings cannot be left half-updated by a panic.
    active.lock().unwrap_or_else(|e| e.into_inner())
}

/// Frees its key from the active set when dropped.
#[derive(Debug)]
pub struct ActiveGuard {
    key: String,
    active: ActiveSet,
}

impl ActiveGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        lock_active(&self.active).remove(&self.key);
    }
}

/// Durable key → `CacheEntry` cache with TTL expiry and single-flight
/// bookkeeping. Keys are normalized with `cache_key` on every call.
pub struct ContentCache {
    store: Arc<dyn IndexStore<CacheEntry>>,
    ttl: Option<chrono::Duration>,
    active: ActiveSet,
}

impl ContentCache {
    pub fn new(store: Arc<dyn IndexStore<CacheEntry>>, config: &CacheConfig) -> Self {
        // A TTL too large to represent never expires.
        let ttl = (config.ttl_hours > 0)
            .then(|| chrono::Duration::try_hours(config.ttl_hours))
            .flatten();
        Self {
            store,
            ttl,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// `None` means entries never expire.
    pub fn ttl(&self) -> Option<chrono::Duration> {
        self.ttl
    }

    /// The live entry for `key`. An expired entry is evicted and reported
    /// as absent.
    pub fn check(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        self.check_at(key, Utc::now())
    }

    pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, StoreError> {
        let key = cache_key(key);
        let Some(entry) = self.store.get(&key)? else {
            metrics::CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
            return Ok(None);
        };

        if entry.is_expired_at(self.ttl, now) {
            // Keep an entry that was replaced after the read.
            let read_created_at = entry.created_at;
            self.store
                .remove_if(&key, &|current: &CacheEntry| current.created_at == read_created_at)?;
            metrics::CACHE_LOOKUPS.with_label_values(&["expired"]).inc();
            debug!(key = %key, "Evicted expired cache entry");
            return Ok(None);
        }

        metrics::CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
        Ok(Some(entry))
    }

    /// Store `entry`, replacing any previous entry for `key`.
    pub fn add(&self, key: &str, entry: CacheEntry) -> Result<(), StoreError> {
        let key = cache_key(key);
        self.store.put(&key, entry)?;
        info!(key = %key, "Cached resolution");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.store.remove(&cache_key(key))
    }

    /// Raw entry without expiry handling.
    pub fn peek(&self, key: &str) -> Result<Option<CacheEntry>, StoreError> {
        self.store.get(&cache_key(key))
    }

    /// Remove all expired entries; returns how many were removed.
    pub fn cleanup_expired(&self) -> Result<usize, StoreError> {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        if self.ttl.is_none() {
            return Ok(0);
        }
        let expired: Vec<String> = self
            .store
            .all()?
            .into_iter()
            .filter(|(_, e)| e.is_expired_at(self.ttl, now))
            .map(|(k, _)| k)
            .collect();

        let ttl = self.ttl;
        let removed = self
            .store
            .remove_many_if(&expired, &|e: &CacheEntry| e.is_expired_at(ttl, now))?;
        if removed > 0 {
            info!(removed = removed, "Removed expired cache entries");
        }
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        let now = Utc::now();
        let mut stats = CacheStats {
            in_flight: lock_active(&self.active).len(),
            ..Default::default()
        };
        for (_, entry) in self.store.all()? {
            stats.total += 1;
            stats.total_size_bytes += entry.file_size_bytes.unwrap_or(0);
            if entry.is_expired_at(self.ttl, now) {
                stats.expired += 1;
            } else {
                stats.active += 1;
            }
        }
        Ok(stats)
    }

    /// Live entries whose key contains `fragment`, newest first.
    pub fn search(&self, fragment: &str) -> Result<Vec<(String, CacheEntry)>, StoreError> {
        let needle = cache_key(fragment);
        let now = Utc::now();
        let mut matches: Vec<_> = self
            .store
            .all()?
            .into_iter()
            .filter(|(k, e)| k.contains(&needle) && !e.is_expired_at(self.ttl, now))
            .collect();
        matches.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at));
        Ok(matches)
    }

    /// Claim `key` for a resolution. `None` when another resolution holds it.
    pub fn mark_active(&self, key: &str) -> Option<ActiveGuard> {
        let key = cache_key(key);
        let mut active = lock_active(&self.active);
        if !active.insert(key.clone()) {
            return None;
        }
        Some(ActiveGuard {
            key,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, key: &str) -> bool {
        lock_active(&self.active).contains(&cache_key(key))
    }

    /// Release `key` without waiting for its guard to drop.
    pub fn mark_completed(&self, key: &str) {
        lock_active(&self.active).remove(&cache_key(key));
    }

    pub fn active_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = lock_active(&self.active).iter().cloned().collect();
        keys.sort();
        keys
    }

    /// Run `cleanup_expired` every `interval` until shutdown.
    pub fn spawn_cleanup_loop(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Cache cleanup loop started");
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cache cleanup loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Err(e) = self.cleanup_expired() {
                            error!(error = %e, "Cache cleanup failed");
                        }
                    }
                }
            }
            info!("Cache cleanup loop stopped");
        })
    }
}
