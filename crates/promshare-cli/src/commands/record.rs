use promshare::{CollectorRegistry, MetricKind, PromshareConfig};
use tracing::debug;

use super::{open_registry, parse_labels};

/// Help text and buckets to register with. Whatever the caller leaves out is
/// taken from the published schema, so one invocation without `--help-text`
/// does not overwrite the help other processes see.
fn resolve_schema(
    registry: &CollectorRegistry,
    kind: MetricKind,
    namespace: &str,
    name: &str,
    help: Option<&str>,
    buckets: Option<Vec<f64>>,
) -> anyhow::Result<(String, Option<Vec<f64>>)> {
    let published = registry
        .published_schema(namespace, name)?
        .filter(|(identity, _)| identity.kind == kind);
    if published.is_some() {
        debug!(namespace, name, "reusing published schema");
    }
    let help = match (help, &published) {
        (Some(help), _) => help.to_string(),
        (None, Some((_, schema))) => schema.help.clone(),
        (None, None) => String::new(),
    };
    let buckets = match (buckets, published) {
        (Some(buckets), _) => Some(buckets),
        (None, Some((_, schema))) if kind == MetricKind::Histogram => Some(schema.buckets),
        (None, _) => None,
    };
    Ok((help, buckets))
}

#[derive(Debug, Clone, Copy)]
pub enum GaugeOp {
    Set(f64),
    Add(f64),
}

pub fn inc(
    config: &PromshareConfig,
    namespace: &str,
    name: &str,
    help: Option<&str>,
    labels: &[String],
    by: f64,
) -> anyhow::Result<()> {
    let (names, values) = parse_labels(labels)?;
    let registry = open_registry(config)?;
    let (help, _) = resolve_schema(&registry, MetricKind::Counter, namespace, name, help, None)?;
    let counter = registry.get_or_register_counter(namespace, name, &help, &names)?;
    let value = counter.inc_by(by, &values)?;
    println!("{} = {}", counter.identity().fqname(), promshare::format_value(value));
    Ok(())
}

pub fn gauge(
    config: &PromshareConfig,
    namespace: &str,
    name: &str,
    help: Option<&str>,
    labels: &[String],
    op: GaugeOp,
) -> anyhow::Result<()> {
    let (names, values) = parse_labels(labels)?;
    let registry = open_registry(config)?;
    let (help, _) = resolve_schema(&registry, MetricKind::Gauge, namespace, name, help, None)?;
    let gauge = registry.get_or_register_gauge(namespace, name, &help, &names)?;
    let value = match op {
        GaugeOp::Set(v) => gauge.set(v, &values)?,
        GaugeOp::Add(delta) => gauge.inc_by(delta, &values)?,
    };
    println!("{} = {}", gauge.identity().fqname(), promshare::format_value(value));
    Ok(())
}

pub fn observe(
    config: &PromshareConfig,
    namespace: &str,
    name: &str,
    help: Option<&str>,
    labels: &[String],
    buckets: Option<Vec<f64>>,
    value: f64,
) -> anyhow::Result<()> {
    let (names, values) = parse_labels(labels)?;
    let registry = open_registry(config)?;
    let (help, buckets) = resolve_schema(&registry, MetricKind::Histogram, namespace, name, help, buckets)?;
    let histogram = registry.get_or_register_histogram(namespace, name, &help, &names, buckets)?;
    histogram.observe(value, &values)?;
    println!("{} observed {}", histogram.identity().fqname(), promshare::format_value(value));
    Ok(())
}
