//! RedbStore: redb-backed storage adapter.
//!
//! Values live in the `samples` table (`&str → f64`), schema documents in
//! the `meta` table. Every add or set runs in its own write transaction, so
//! it is atomic for its key and serialized against every other writer.
//!
//! Two file modes:
//! - [`RedbStore::open`] holds the database for the life of the store. Only
//!   one process can do this at a time (redb locks the file).
//! - [`RedbStore::shared`] opens the file for each operation and closes it
//!   again. Processes take turns on the file lock; a busy lock is retried
//!   per the [`RetryPolicy`] and reported as contention when exhausted.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, DatabaseError, ReadableDatabase, ReadableTable};
use tracing::{debug, warn};

use crate::adapter::StorageAdapter;
use crate::error::{StoreError, StoreResult};
use crate::retry::RetryPolicy;
use crate::tables::{META, SAMPLES};

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

#[derive(Clone)]
enum Handle {
    Held(Arc<Database>),
    Shared(PathBuf),
}

/// Storage adapter backed by a redb database.
#[derive(Clone)]
pub struct RedbStore {
    handle: Handle,
    retry: RetryPolicy,
}

impl RedbStore {
    /// Open (or create) a store at `path`, holding the file for the store's lifetime.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        ensure_tables(&db)?;
        debug!(?path, "redb store opened");
        Ok(Self {
            handle: Handle::Held(Arc::new(db)),
            retry: RetryPolicy::default(),
        })
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        ensure_tables(&db)?;
        debug!("in-memory redb store opened");
        Ok(Self {
            handle: Handle::Held(Arc::new(db)),
            retry: RetryPolicy::default(),
        })
    }

    /// Use the store file at `path` in shared mode: the file is opened per
    /// operation so that other processes can use it in between.
    pub fn shared(path: &Path, retry: RetryPolicy) -> StoreResult<Self> {
        let store = Self {
            handle: Handle::Shared(path.to_path_buf()),
            retry,
        };
        store.with_db("<init>", ensure_tables)?;
        debug!(?path, max_attempts = retry.max_attempts, "redb store attached in shared mode");
        Ok(store)
    }

    /// Run `f` against an open database, acquiring the file lock first in
    /// shared mode.
    fn with_db<T>(
        &self,
        key: &str,
        f: impl FnOnce(&Database) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let path = match &self.handle {
            Handle::Held(db) => return f(db.as_ref()),
            Handle::Shared(path) => path,
        };
        for attempt in 1..=self.retry.max_attempts {
            match Database::create(path) {
                Ok(db) => return f(&db),
                Err(DatabaseError::DatabaseAlreadyOpen) => self.retry.pause(attempt),
                Err(e) => return Err(StoreError::Unavailable(e.to_string())),
            }
        }
        warn!(?path, %key, attempts = self.retry.max_attempts, "redb file lock not acquired");
        Err(StoreError::Contention {
            key: key.to_string(),
            attempts: self.retry.max_attempts,
        })
    }
}

/// Create all tables if they don't exist yet.
fn ensure_tables(db: &Database) -> StoreResult<()> {
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    // Opening a table in a write transaction creates it if absent.
    txn.open_table(SAMPLES).map_err(map_err!(Table))?;
    txn.open_table(META).map_err(map_err!(Table))?;
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(())
}

impl StorageAdapter for RedbStore {
    fn add_and_get(&self, key: &str, delta: f64) -> StoreResult<f64> {
        self.with_db(key, |db| {
            let txn = db.begin_write().map_err(map_err!(Transaction))?;
            let next;
            {
                let mut table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
                let current = table
                    .get(key)
                    .map_err(map_err!(Read))?
                    .map(|guard| guard.value())
                    .unwrap_or(0.0);
                next = current + delta;
                table.insert(key, next).map_err(map_err!(Write))?;
            }
            txn.commit().map_err(map_err!(Transaction))?;
            Ok(next)
        })
    }

    fn set_and_get(&self, key: &str, value: f64) -> StoreResult<f64> {
        self.with_db(key, |db| {
            let txn = db.begin_write().map_err(map_err!(Transaction))?;
            {
                let mut table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
                table.insert(key, value).map_err(map_err!(Write))?;
            }
            txn.commit().map_err(map_err!(Transaction))?;
            Ok(value)
        })
    }

    fn enumerate(&self, prefix: &str) -> StoreResult<Vec<(String, f64)>> {
        self.with_db(prefix, |db| {
            let txn = db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
            let mut results = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                if key.value().starts_with(prefix) {
                    results.push((key.value().to_string(), value.value()));
                }
            }
            Ok(results)
        })
    }

    fn put_meta(&self, key: &str, document: &str) -> StoreResult<()> {
        self.with_db(key, |db| {
            let txn = db.begin_write().map_err(map_err!(Transaction))?;
            {
                let mut table = txn.open_table(META).map_err(map_err!(Table))?;
                table.insert(key, document).map_err(map_err!(Write))?;
            }
            txn.commit().map_err(map_err!(Transaction))?;
            Ok(())
        })
    }

    fn enumerate_meta(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        self.with_db(prefix, |db| {
            let txn = db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(META).map_err(map_err!(Table))?;
            let mut results = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                if key.value().starts_with(prefix) {
                    results.push((key.value().to_string(), value.value().to_string()));
                }
            }
            Ok(results)
        })
    }

    fn wipe(&self, prefix: &str) -> StoreResult<u64> {
        let removed = self.with_db(prefix, |db| {
            // Collect keys and delete them inside one write transaction.
            let txn = db.begin_write().map_err(map_err!(Transaction))?;
            let removed = {
                let mut samples = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
                let keys = matching_keys(&samples, prefix)?;
                for key in &keys {
                    samples.remove(key.as_str()).map_err(map_err!(Write))?;
                }
                keys.len() as u64
            };
            txn.commit().map_err(map_err!(Transaction))?;
            Ok(removed)
        })?;
        debug!(%prefix, removed, "redb store wiped");
        Ok(removed)
    }
}

fn matching_keys<T>(table: &T, prefix: &str) -> StoreResult<Vec<String>>
where
    T: ReadableTable<&'static str, f64>,
{
    let mut keys = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, _) = entry.map_err(map_err!(Read))?;
        if key.value().starts_with(prefix) {
            keys.push(key.value().to_string());
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn add_and_set_in_memory() {
        let store = RedbStore::open_in_memory().unwrap();
        assert_eq!(store.add_and_get("c", 1.0).unwrap(), 1.0);
        assert_eq!(store.add_and_get("c", 4.0).unwrap(), 5.0);
        assert_eq!(store.set_and_get("g", -2.5).unwrap(), -2.5);

        let all = store.enumerate("").unwrap();
        assert_eq!(all, vec![("c".to_string(), 5.0), ("g".to_string(), -2.5)]);
    }

    #[test]
    fn wipe_scoped_to_prefix() {
        let store = RedbStore::open_in_memory().unwrap();
        store.add_and_get("a:x", 1.0).unwrap();
        store.add_and_get("a:y", 1.0).unwrap();
        store.put_meta("a:meta", "{}").unwrap();
        store.add_and_get("b:x", 1.0).unwrap();

        assert_eq!(store.wipe("a:").unwrap(), 2);
        assert!(store.enumerate("a:").unwrap().is_empty());
        assert_eq!(store.enumerate_meta("a:").unwrap().len(), 1);
        assert_eq!(store.enumerate("b:").unwrap().len(), 1);
    }

    #[test]
    fn meta_round_trip() {
        let store = RedbStore::open_in_memory().unwrap();
        store.put_meta("p:meta:x", r#"{"help":"h"}"#).unwrap();
        store.put_meta("p:meta:x", r#"{"help":"h2"}"#).unwrap();

        let docs = store.enumerate_meta("p:meta:").unwrap();
        assert_eq!(docs, vec![("p:meta:x".to_string(), r#"{"help":"h2"}"#.to_string())]);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.redb");

        {
            let store = RedbStore::open(&path).unwrap();
            store.add_and_get("requests", 3.0).unwrap();
        }

        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.add_and_get("requests", 1.0).unwrap(), 4.0);
    }

    #[test]
    fn shared_handles_see_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.redb");
        let policy = RetryPolicy::new(200, Duration::from_millis(1));

        let a = RedbStore::shared(&path, policy).unwrap();
        let b = RedbStore::shared(&path, policy).unwrap();

        a.add_and_get("hits", 2.0).unwrap();
        b.add_and_get("hits", 3.0).unwrap();
        assert_eq!(a.enumerate("hits").unwrap(), vec![("hits".to_string(), 5.0)]);
    }

    #[test]
    fn shared_mode_reports_contention_when_file_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("held.redb");

        let holder = RedbStore::open(&path).unwrap();
        let err = RedbStore::shared(&path, RetryPolicy::new(3, Duration::ZERO))
            .err()
            .expect("file is locked by holder");
        assert!(err.is_contention(), "unexpected error: {err}");
        drop(holder);

        let store = RedbStore::shared(&path, RetryPolicy::new(3, Duration::ZERO)).unwrap();
        assert_eq!(store.add_and_get("x", 1.0).unwrap(), 1.0);
    }
}
