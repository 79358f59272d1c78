//! The storage contract every metric value goes through.

use std::sync::Arc;

use crate::error::StoreResult;

/// Atomic key-value operations backing all metric kinds.
///
/// Values are `f64`. A missing key behaves as `0.0` for
/// [`add_and_get`](StorageAdapter::add_and_get): the record is created on
/// first write. Each call is atomic for its own key only.
///
/// Implementations must be shareable across threads; cross-process sharing
/// is a property of the backend (see [`RedbStore::shared`](crate::RedbStore::shared)).
pub trait StorageAdapter: Send + Sync {
    /// Atomically add `delta` to the record at `key` and return the new value.
    fn add_and_get(&self, key: &str, delta: f64) -> StoreResult<f64>;

    /// Atomically overwrite the record at `key` with `value`.
    fn set_and_get(&self, key: &str, value: f64) -> StoreResult<f64>;

    /// Snapshot every value record whose key starts with `prefix`, sorted by key.
    ///
    /// Each record is current at the moment it is read; there is no
    /// isolation across keys.
    fn enumerate(&self, prefix: &str) -> StoreResult<Vec<(String, f64)>>;

    /// Store (or replace) a metadata document at `key`.
    fn put_meta(&self, key: &str, document: &str) -> StoreResult<()>;

    /// Snapshot every metadata document whose key starts with `prefix`.
    fn enumerate_meta(&self, prefix: &str) -> StoreResult<Vec<(String, String)>>;

    /// Remove every value record under `prefix`. Metadata documents are
    /// kept. Returns the number of records removed.
    fn wipe(&self, prefix: &str) -> StoreResult<u64>;
}

impl<T: StorageAdapter + ?Sized> StorageAdapter for Arc<T> {
    fn add_and_get(&self, key: &str, delta: f64) -> StoreResult<f64> {
        (**self).add_and_get(key, delta)
    }

    fn set_and_get(&self, key: &str, value: f64) -> StoreResult<f64> {
        (**self).set_and_get(key, value)
    }

    fn enumerate(&self, prefix: &str) -> StoreResult<Vec<(String, f64)>> {
        (**self).enumerate(prefix)
    }

    fn put_meta(&self, key: &str, document: &str) -> StoreResult<()> {
        (**self).put_meta(key, document)
    }

    fn enumerate_meta(&self, prefix: &str) -> StoreResult<Vec<(String, String)>> {
        (**self).enumerate_meta(prefix)
    }

    fn wipe(&self, prefix: &str) -> StoreResult<u64> {
        (**self).wipe(prefix)
    }
}
