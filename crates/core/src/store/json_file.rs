//! Whole-file JSON index store.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{error, warn};

use super::{IndexStore, StoreError};

/// Keeps the whole index in memory and rewrites the file on every
/// mutation (write temp file, fsync, rename).
///
/// A file that does not parse is moved aside to `<name>.corrupt-<ts>` and
/// the store starts empty; entries that fail to decode individually are
/// dropped with a warning.
#[derive(Debug)]
pub struct JsonFileStore<V> {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, V>>,
}

impl<V> JsonFileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = Self::load(&path)?;
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<BTreeMap<String, V>, StoreError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let values: BTreeMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(e) => {
                let aside = quarantine(path)?;
                error!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    error = %e,
                    "Index file is corrupt, starting empty"
                );
                return Ok(BTreeMap::new());
            }
        };

        let mut entries = BTreeMap::new();
        for (key, value) in values {
            match serde_json::from_value(value) {
                Ok(v) => {
                    entries.insert(key, v);
                }
                Err(e) => {
                    warn!(path = %path.display(), key = %key, error = %e, "Dropping malformed index entry");
                }
            }
        }
        Ok(entries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, V>>, StoreError> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, entries: &BTreeMap<String, V>) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(entries)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Apply `mutate` and persist; the in-memory map is restored when the
    /// write fails.
    fn write_through<R>(
        &self,
        mutate: impl FnOnce(&mut BTreeMap<String, V>) -> R,
    ) -> Result<R, StoreError> {
        let mut entries = self.lock()?;
        let before = entries.clone();
        let out = mutate(&mut entries);
        if let Err(e) = self.persist(&entries) {
            *entries = before;
            return Err(e);
        }
        Ok(out)
    }
}

/// Move a corrupt file aside; returns its new path.
fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S%.3f")));
    let aside = path.with_file_name(name);
    fs::rename(path, &aside)?;
    Ok(aside)
}

impl<V> IndexStore<V> for JsonFileStore<V>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn all(&self) -> Result<Vec<(String, V)>, StoreError> {
        Ok(self
            .lock()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&self, key: &str, value: V) -> Result<(), StoreError> {
        self.write_through(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        if !self.lock()?.contains_key(key) {
            return Ok(false);
        }
        self.write_through(|entries| entries.remove(key).is_some())
    }

    fn remove_many_if(
        &self,
        keys: &[String],
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize, StoreError> {
        let mut entries = self.lock()?;
        let doomed: Vec<&String> = keys
            .iter()
            .filter(|k| entries.get(k.as_str()).is_some_and(|v| predicate(v)))
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let before = entries.clone();
        for key in &doomed {
            entries.remove(key.as_str());
        }
        if let Err(e) = self.persist(&entries) {
            *entries = before;
            return Err(e);
        }
        Ok(doomed.len())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock()?.len())
    }
}
