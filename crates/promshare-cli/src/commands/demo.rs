//! Walks through every metric kind against an in-memory store.

use std::sync::Arc;

use promshare::{CollectorRegistry, MemoryStore};

pub fn run() -> anyhow::Result<()> {
    let registry = CollectorRegistry::new(Arc::new(MemoryStore::new()));
    print!("{}", workload(&registry)?);
    Ok(())
}

/// Record the sample workload and return the report text.
pub fn workload(registry: &CollectorRegistry) -> anyhow::Result<String> {
    let requests = registry.register_counter(
        "app",
        "requests_total",
        "Total number of requests",
        &["method", "endpoint"],
    )?;
    requests.inc(&["GET", "/api/users"])?;
    requests.inc(&["POST", "/api/users"])?;
    requests.inc_by(5.0, &["GET", "/api/products"])?;

    let active = registry.register_gauge("app", "active_users", "Number of active users", &["region"])?;
    active.set(150.0, &["europe"])?;
    active.set(200.0, &["asia"])?;
    active.inc(&["europe"])?;
    active.dec(&["asia"])?;
    active.inc_by(10.0, &["europe"])?;

    let duration = registry.register_histogram(
        "app",
        "request_duration_seconds",
        "Request duration in seconds",
        &["method"],
        Some(vec![0.1, 0.5, 1.0, 2.0, 5.0]),
    )?;
    duration.observe(0.05, &["GET"])?;
    duration.observe(0.2, &["GET"])?;
    duration.observe(0.8, &["POST"])?;
    duration.observe(1.5, &["POST"])?;
    duration.observe(3.0, &["DELETE"])?;

    let hits = registry.get_or_register_counter("cache", "hits_total", "Cache hits", &["cache_type"])?;
    hits.inc(&["redis"])?;
    hits.inc(&["memory"])?;

    let mut report = String::from("=== metrics ===\n");
    report.push_str(&registry.render()?);

    let removed = registry.wipe()?;
    report.push_str(&format!("\n=== wiped {removed} records ===\n"));
    report.push_str(&registry.render()?);

    let per_process = registry.get_or_register_counter(
        "shared",
        "process_requests",
        "Requests by process",
        &["pid"],
    )?;
    per_process.inc(&[std::process::id().to_string()])?;
    report.push_str("\n=== after wipe, this process ===\n");
    report.push_str(&registry.render()?);

    Ok(report)
}
