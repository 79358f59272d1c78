//! promshare-store: storage adapters for the promshare metrics registry.
//!
//! Every metric value lives behind the [`StorageAdapter`] trait: a flat
//! string-keyed map of `f64` values with atomic per-key add and set, prefix
//! enumeration, and prefix wipe. Schema metadata (JSON documents published
//! by registries) travels through the same adapter in a separate keyspace.
//!
//! # Backends
//!
//! ```text
//! MemoryStore   in-process map of atomics (CAS loop per add)
//! RedbStore     redb file; `open` holds the database, `shared` opens it
//!               per operation so several OS processes can take turns
//! ```
//!
//! No operation is atomic across keys. Callers that update several keys
//! (histogram buckets) must tolerate readers seeing a partial update.

pub mod adapter;
pub mod error;
pub mod memory;
pub mod redb_store;
pub mod retry;
pub mod tables;

pub use adapter::StorageAdapter;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use retry::RetryPolicy;
