pub mod demo;
pub mod record;
pub mod render;

use std::path::Path;

use promshare::config::Backend;
use promshare::{CollectorRegistry, PromshareConfig};
use tracing::warn;

/// Load the config file (if any) and apply the `--store` override.
pub fn load_config(config: Option<&Path>, store: Option<&Path>) -> anyhow::Result<PromshareConfig> {
    let mut config = match config {
        Some(path) => PromshareConfig::from_file(path)?,
        None => PromshareConfig::default(),
    };
    if let Some(path) = store {
        config.store.backend = Backend::Redb;
        config.store.path = Some(path.to_path_buf());
        config.store.shared = true;
    }
    Ok(config)
}

/// Open the configured store and build a registry over it.
pub fn open_registry(config: &PromshareConfig) -> anyhow::Result<CollectorRegistry> {
    if config.store.backend == Backend::Memory {
        warn!("memory backend: values are discarded when this process exits (use --store)");
    }
    let store = config.open_store()?;
    config.registry(store)
}

/// Split `name=value` arguments into parallel name and value lists.
pub fn parse_labels(labels: &[String]) -> anyhow::Result<(Vec<&str>, Vec<&str>)> {
    let mut names = Vec::with_capacity(labels.len());
    let mut values = Vec::with_capacity(labels.len());
    for label in labels {
        let (name, value) = label
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("label {label:?} is not in name=value form"))?;
        names.push(name);
        values.push(value);
    }
    Ok((names, values))
}
