//! SQLite-backed index store.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::warn;

use super::{IndexStore, StoreError};

/// One table of JSON values keyed by text, upserted per key.
pub struct SqliteIndexStore<V> {
    conn: Mutex<Connection>,
    table: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<V> SqliteIndexStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    /// Open (or create) the database file and `table`.
    pub fn new(path: &Path, table: &'static str) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn, table)
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory(table: &'static str) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, table)
    }

    fn from_connection(conn: Connection, table: &'static str) -> Result<Self, StoreError> {
        Self::initialize_schema(&conn, table)?;
        Ok(Self {
            conn: Mutex::new(conn),
            table,
            _value: PhantomData,
        })
    }

    fn initialize_schema(conn: &Connection, table: &str) -> Result<(), StoreError> {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#
        ))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn decode(&self, key: &str, raw: &str) -> Option<V> {
        match serde_json::from_str(raw) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(table = self.table, key = key, error = %e, "Skipping malformed row");
                None
            }
        }
    }
}

impl<V> IndexStore<V> for SqliteIndexStore<V>
where
    V: Serialize + DeserializeOwned + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", self.table),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(raw.and_then(|raw| self.decode(key, &raw)))
    }

    fn all(&self) -> Result<Vec<(String, V)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT key, value FROM {} ORDER BY key",
            self.table
        ))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(key, raw)| self.decode(&key, &raw).map(|v| (key, v)))
            .collect())
    }

    fn put(&self, key: &str, value: V) -> Result<(), StoreError> {
        let json = serde_json::to_string(&value)?;
        let conn = self.lock()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                self.table
            ),
            params![key, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let n = conn.execute(
            &format!("DELETE FROM {} WHERE key = ?1", self.table),
            params![key],
        )?;
        Ok(n > 0)
    }

    fn remove_many_if(
        &self,
        keys: &[String],
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut select = tx.prepare(&format!("SELECT value FROM {} WHERE key = ?1", self.table))?;
            let mut delete = tx.prepare(&format!("DELETE FROM {} WHERE key = ?1", self.table))?;
            for key in keys {
                let raw: Option<String> = select
                    .query_row(params![key], |row| row.get(0))
                    .optional()?;
                let matches = raw
                    .and_then(|raw| self.decode(key, &raw))
                    .is_some_and(|v| predicate(&v));
                if matches {
                    removed += delete.execute(params![key])?;
                }
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
            row.get(0)
        })?;
        Ok(n as usize)
    }
}
