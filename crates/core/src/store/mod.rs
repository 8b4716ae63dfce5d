//! Single-writer key/value index stores.
//!
//! The cache and job indices are both `IndexStore<V>`s: a whole-file JSON
//! backend that keeps the external schema stable, a SQLite backend with
//! per-key upserts, and an in-memory one for tests.

mod json_file;
mod memory;
mod sqlite;

pub use json_file::JsonFileStore;
pub use memory::MemoryIndexStore;
pub use sqlite::SqliteIndexStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Durable key → value index.
///
/// Every mutation is persisted before it returns.
pub trait IndexStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<V>, StoreError>;

    /// All entries, ordered by key.
    fn all(&self) -> Result<Vec<(String, V)>, StoreError>;

    /// Insert or replace the value for `key`.
    fn put(&self, key: &str, value: V) -> Result<(), StoreError>;

    /// Returns whether an entry was removed.
    fn remove(&self, key: &str) -> Result<bool, StoreError>;

    /// Remove those of `keys` whose current value satisfies `predicate`, in
    /// one write under the store lock; returns how many were removed.
    fn remove_many_if(
        &self,
        keys: &[String],
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize, StoreError>;

    /// Remove `key` only if its current value satisfies `predicate`.
    fn remove_if(&self, key: &str, predicate: &dyn Fn(&V) -> bool) -> Result<bool, StoreError> {
        Ok(self.remove_many_if(&[key.to_string()], predicate)? > 0)
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.all()?.len())
    }
}
