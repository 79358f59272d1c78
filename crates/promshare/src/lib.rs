//! promshare: a metrics registry for workloads split across processes.
//!
//! Metric definitions (schemas) live in each process's
//! [`CollectorRegistry`]; metric *values* live in a shared
//! [`StorageAdapter`], so any number of worker processes can accumulate
//! into the same counters, gauges and histograms and any one of them can
//! render the combined view.
//!
//! # Architecture
//!
//! ```text
//! CollectorRegistry
//!   ├── register_* / get_or_register_* → Counter | Gauge | Histogram handle
//!   │      └── inc / set / observe → KeyCodec key → StorageAdapter add/set
//!   ├── collect() → enumerate store → Vec<MetricFamilySamples>
//!   └── wipe()    → remove this registry's records from the store
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for a /metrics endpoint
//! ```
//!
//! Only single-key operations are atomic. A histogram observation touches
//! one key per qualifying bucket plus the sum, so a concurrent `collect()`
//! can see part of an observation.

pub mod buckets;
pub mod codec;
pub mod config;
pub mod counter;
pub mod error;
pub mod gauge;
pub mod histogram;
pub mod registry;
pub mod render;
pub mod types;

pub use codec::{KeyCodec, RecordTag};
pub use config::PromshareConfig;
pub use counter::Counter;
pub use error::{MetricsError, MetricsResult};
pub use gauge::Gauge;
pub use histogram::Histogram;
pub use promshare_store::{MemoryStore, RedbStore, RetryPolicy, StorageAdapter, StoreError};
pub use registry::{CollectorRegistry, Metric};
pub use render::{format_value, render_prometheus};
pub use types::*;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::{CollectorRegistry, MemoryStore};

    pub fn memory_registry() -> CollectorRegistry {
        CollectorRegistry::new(Arc::new(MemoryStore::new()))
    }
}
