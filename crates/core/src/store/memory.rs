use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{IndexStore, StoreError};

/// Non-durable store for tests and ephemeral setups.
#[derive(Debug)]
pub struct MemoryIndexStore<V> {
    entries: Mutex<BTreeMap<String, V>>,
}

impl<V> MemoryIndexStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }
}

impl<V> Default for MemoryIndexStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> IndexStore<V> for MemoryIndexStore<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn all(&self) -> Result<Vec<(String, V)>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put(&self, key: &str, value: V) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    fn remove_many_if(
        &self,
        keys: &[String],
        predicate: &dyn Fn(&V) -> bool,
    ) -> Result<usize, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        let mut removed = 0;
        for key in keys {
            if entries.get(key).is_some_and(|v| predicate(v)) {
                entries.remove(key);
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_basic_ops() {
        let store: MemoryIndexStore<i32> = MemoryIndexStore::new();
        store.put("b", 2).unwrap();
        store.put("a", 1).unwrap();
        store.put("a", 3).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(3));
        assert_eq!(
            store.all().unwrap(),
            vec![("a".to_string(), 3), ("b".to_string(), 2)]
        );
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(
            store
                .remove_many_if(&["b".to_string(), "zz".to_string()], &|_| true)
                .unwrap(),
            1
        );
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_remove_if_checks_current_value() {
        let store: MemoryIndexStore<i32> = MemoryIndexStore::new();
        store.put("a", 1).unwrap();

        assert!(!store.remove_if("a", &|v| *v == 2).unwrap());
        assert_eq!(store.get("a").unwrap(), Some(1));
        assert!(store.remove_if("a", &|v| *v == 1).unwrap());
        assert!(!store.remove_if("a", &|_| true).unwrap());
    }
}
