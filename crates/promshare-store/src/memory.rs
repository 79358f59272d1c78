//! MemoryStore: in-process storage adapter.
//!
//! Each value is an `AtomicU64` holding an `f64` bit pattern. Adds run a
//! compare-and-swap loop bounded by the store's [`RetryPolicy`]; sets are a
//! plain atomic store. The map itself is only write-locked to insert a new
//! key, so writers on existing keys never block each other.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, warn};

use crate::adapter::StorageAdapter;
use crate::error::{StoreError, StoreResult};
use crate::retry::RetryPolicy;

/// Thread-safe in-memory store. Cheap to clone; clones share the data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    values: Arc<RwLock<HashMap<String, Arc<AtomicU64>>>>,
    meta: Arc<RwLock<BTreeMap<String, String>>>,
    retry: RetryPolicy,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with a custom bound on CAS attempts per add.
    pub fn with_retry(retry: RetryPolicy) -> Self {
        Self {
            retry,
            ..Self::default()
        }
    }

    /// Number of value records currently held.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fetch the cell for `key`, creating it at `0.0` if absent.
    fn cell(&self, key: &str) -> Arc<AtomicU64> {
        if let Some(cell) = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return cell.clone();
        }
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0f64.to_bits())))
            .clone()
    }
}

impl StorageAdapter for MemoryStore {
    fn add_and_get(&self, key: &str, delta: f64) -> StoreResult<f64> {
        let cell = self.cell(key);
        let mut current = cell.load(Ordering::Acquire);
        for attempt in 1..=self.retry.max_attempts {
            let next = (f64::from_bits(current) + delta).to_bits();
            match cell.compare_exchange(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(f64::from_bits(next)),
                Err(observed) => {
                    current = observed;
                    self.retry.pause(attempt);
                }
            }
        }
        warn!(%key, attempts = self.retry.max_attempts, "memory store add gave up");
        Err(StoreError::Contention {
            key: key.to_string(),
            attempts: self.retry.max_attempts,
        })
    }

    fn set_and_get(&self, key: &str, value: f64) -> StoreResult<f64> {
        self.cell(key).store(value.to_bits(), Ordering::Release);
        Ok(value)
    }

    fn enumerate(&self, prefix: &str) -> StoreResult<Vec<(String, f64)>> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        let mut results: Vec<(String, f64)> = values
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, cell)| (key.clone(), f64::from_bits(cell.load(Ordering::Acquire))))
            .collect();
        results.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(results)
    }

    fn put_meta(&self, key: &str, document: &str) -> StoreResult<()> {
        self.meta
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), document.to_string());
        Ok(())
    }

    fn enumerate_meta(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        let meta = self.meta.read().unwrap_or_else(PoisonError::into_inner);
        Ok(meta
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, doc)| (key.clone(), doc.clone()))
            .collect())
    }

    fn wipe(&self, prefix: &str) -> StoreResult<u64> {
        let removed = {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            let before = values.len();
            values.retain(|key, _| !key.starts_with(prefix));
            (before - values.len()) as u64
        };
        debug!(%prefix, removed, "memory store wiped");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn add_creates_at_zero() {
        let store = MemoryStore::new();
        assert_eq!(store.add_and_get("a", 2.5).unwrap(), 2.5);
        assert_eq!(store.add_and_get("a", -1.0).unwrap(), 1.5);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_overwrites() {
        let store = MemoryStore::new();
        store.add_and_get("g", 10.0).unwrap();
        assert_eq!(store.set_and_get("g", 3.0).unwrap(), 3.0);
        assert_eq!(store.enumerate("g").unwrap(), vec![("g".to_string(), 3.0)]);
    }

    #[test]
    fn enumerate_filters_and_sorts() {
        let store = MemoryStore::new();
        store.set_and_get("p:b", 2.0).unwrap();
        store.set_and_get("p:a", 1.0).unwrap();
        store.set_and_get("q:a", 9.0).unwrap();

        let records = store.enumerate("p:").unwrap();
        assert_eq!(
            records,
            vec![("p:a".to_string(), 1.0), ("p:b".to_string(), 2.0)]
        );
    }

    #[test]
    fn wipe_only_touches_prefix() {
        let store = MemoryStore::new();
        store.set_and_get("p:a", 1.0).unwrap();
        store.put_meta("p:meta", "{}").unwrap();
        store.set_and_get("other:a", 1.0).unwrap();
        store.put_meta("other:meta", "{}").unwrap();

        assert_eq!(store.wipe("p:").unwrap(), 1);
        assert!(store.enumerate("p:").unwrap().is_empty());
        assert_eq!(store.enumerate_meta("p:").unwrap().len(), 1);
        assert_eq!(store.enumerate("other:").unwrap().len(), 1);
        assert_eq!(store.enumerate_meta("other:").unwrap().len(), 1);
    }

    #[test]
    fn meta_prefix_scan() {
        let store = MemoryStore::new();
        store.put_meta("p:meta:b", "2").unwrap();
        store.put_meta("p:meta:a", "1").unwrap();
        store.put_meta("pz", "x").unwrap();

        let docs = store.enumerate_meta("p:meta:").unwrap();
        assert_eq!(
            docs,
            vec![
                ("p:meta:a".to_string(), "1".to_string()),
                ("p:meta:b".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn concurrent_adds_are_not_lost() {
        let store = MemoryStore::with_retry(RetryPolicy::new(u32::MAX, std::time::Duration::ZERO));
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..1000 {
                        store.add_and_get("hits", 1.0).unwrap();
                    }
                });
            }
        });
        assert_eq!(store.enumerate("hits").unwrap()[0].1, 8000.0);
    }
}
