//! promshare.toml configuration parser.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use promshare_store::{MemoryStore, RedbStore, RetryPolicy, StorageAdapter};
use serde::{Deserialize, Serialize};

use crate::registry::{CollectorRegistry, DEFAULT_PREFIX};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromshareConfig {
    pub registry: RegistryConfig,
    pub store: StoreConfig,
    pub histogram: HistogramConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub prefix: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Redb,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    pub path: Option<PathBuf>,
    /// Open the redb file per operation so several processes can share it.
    pub shared: bool,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            backoff_ms: 2,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    pub default_buckets: Option<Vec<f64>>,
}

impl PromshareConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PromshareConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Open the configured storage backend.
    pub fn open_store(&self) -> anyhow::Result<Arc<dyn StorageAdapter>> {
        let store: Arc<dyn StorageAdapter> = match self.store.backend {
            Backend::Memory => Arc::new(MemoryStore::with_retry(self.store.retry.policy())),
            Backend::Redb => {
                let path = self
                    .store
                    .path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("store.path is required for the redb backend"))?;
                if self.store.shared {
                    Arc::new(RedbStore::shared(path, self.store.retry.policy())?)
                } else {
                    Arc::new(RedbStore::open(path)?)
                }
            }
        };
        Ok(store)
    }

    /// Build a registry over `store` with this config's prefix and buckets.
    pub fn registry(&self, store: Arc<dyn StorageAdapter>) -> anyhow::Result<CollectorRegistry> {
        let registry = CollectorRegistry::with_prefix(store, &self.registry.prefix)?;
        Ok(match &self.histogram.default_buckets {
            Some(buckets) => registry.with_default_buckets(buckets.clone())?,
            None => registry,
        })
    }
}
