use std::time::Duration;

use promshare::{CollectorRegistry, PromshareConfig};
use tokio::sync::watch;
use tracing::{info, warn};

use super::open_registry;

pub fn render(config: &PromshareConfig, format: &str) -> anyhow::Result<()> {
    let registry = open_registry(config)?;
    match format {
        "text" => print!("{}", registry.render()?),
        "json" => println!("{}", serde_json::to_string_pretty(&registry.collect()?)?),
        other => anyhow::bail!("unknown format {other:?} (expected text or json)"),
    }
    Ok(())
}

pub fn wipe(config: &PromshareConfig) -> anyhow::Result<()> {
    let registry = open_registry(config)?;
    let removed = registry.wipe()?;
    println!("removed {removed} records under {:?}", registry.prefix());
    Ok(())
}

pub fn watch(config: &PromshareConfig, interval_secs: u64) -> anyhow::Result<()> {
    let registry = open_registry(config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                let _ = shutdown_tx.send(true);
            }
        });

        run_watch(
            &registry,
            Duration::from_secs(interval_secs.max(1)),
            shutdown_rx,
            |text| println!("{text}"),
        )
        .await;
    });
    Ok(())
}

/// Render every `interval` until the shutdown signal fires. Returns the
/// number of successful renders.
pub async fn run_watch(
    registry: &CollectorRegistry,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut emit: impl FnMut(String),
) -> u64 {
    info!(interval_ms = interval.as_millis() as u64, "watch started");
    let mut renders = 0;

    loop {
        match registry.render() {
            Ok(text) => {
                emit(text);
                renders += 1;
            }
            Err(e) => warn!(error = %e, "render failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                info!(renders, "watch stopping");
                break;
            }
        }
    }
    renders
}
