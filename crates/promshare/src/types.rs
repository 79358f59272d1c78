//! Domain types for metric identity, schema and collected samples.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, MetricsResult};

/// Label name injected on histogram bucket samples.
pub const BUCKET_LABEL: &str = "le";

static METRIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("metric name pattern"));

static LABEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("label name pattern"));

/// The kind of a metric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "counter" => Some(MetricKind::Counter),
            "gauge" => Some(MetricKind::Gauge),
            "histogram" => Some(MetricKind::Histogram),
            _ => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Namespace + name + kind. The fully qualified name is the registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricIdentity {
    pub namespace: String,
    pub name: String,
    pub kind: MetricKind,
}

impl MetricIdentity {
    pub fn new(namespace: &str, name: &str, kind: MetricKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
        }
    }

    /// `namespace_name`, or just `name` when the namespace is empty.
    pub fn fqname(&self) -> String {
        fqname(&self.namespace, &self.name)
    }

    /// Check the composed name against the exposition format's name grammar.
    pub fn validate(&self) -> MetricsResult<()> {
        if self.name.is_empty() {
            return Err(MetricsError::InvalidName("metric name is empty".to_string()));
        }
        let fq = self.fqname();
        if !METRIC_NAME.is_match(&fq) {
            return Err(MetricsError::InvalidName(format!(
                "{fq:?} does not match {}",
                METRIC_NAME.as_str()
            )));
        }
        Ok(())
    }
}

/// Compose a fully qualified metric name.
pub fn fqname(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}_{name}")
    }
}

/// Help text, label names and (for histograms) bucket bounds of a family.
///
/// `buckets` holds only the finite, user-visible bounds; the `+Inf` bucket
/// is implicit. It is empty for counters and gauges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub help: String,
    pub label_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buckets: Vec<f64>,
}

impl Schema {
    pub fn new(help: &str, label_names: &[&str]) -> Self {
        Self {
            help: help.to_string(),
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
            buckets: Vec::new(),
        }
    }

    pub fn with_buckets(mut self, buckets: Vec<f64>) -> Self {
        self.buckets = buckets;
        self
    }

    /// Validate label names and bucket bounds for a family of `kind`.
    pub fn validate(&self, kind: MetricKind) -> MetricsResult<()> {
        for (i, label) in self.label_names.iter().enumerate() {
            if label.is_empty() {
                return Err(MetricsError::InvalidLabel("label name is empty".to_string()));
            }
            if !LABEL_NAME.is_match(label) {
                return Err(MetricsError::InvalidLabel(format!(
                    "{label:?} does not match {}",
                    LABEL_NAME.as_str()
                )));
            }
            if label.starts_with("__") {
                return Err(MetricsError::InvalidLabel(format!(
                    "{label:?} uses the reserved __ prefix"
                )));
            }
            if label == BUCKET_LABEL {
                return Err(MetricsError::InvalidLabel(format!(
                    "{BUCKET_LABEL:?} is reserved for histogram buckets"
                )));
            }
            if self.label_names[..i].contains(label) {
                return Err(MetricsError::InvalidLabel(format!(
                    "duplicate label name {label:?}"
                )));
            }
        }

        match kind {
            MetricKind::Histogram => validate_buckets(&self.buckets),
            _ if !self.buckets.is_empty() => Err(MetricsError::InvalidBuckets(format!(
                "{kind} metrics do not take buckets"
            ))),
            _ => Ok(()),
        }
    }

    /// Check a call's label values against this schema's label names.
    pub fn check_values<S: AsRef<str>>(&self, values: &[S]) -> MetricsResult<()> {
        if values.len() != self.label_names.len() {
            return Err(MetricsError::InvalidLabel(format!(
                "expected {} label values ({}), got {}",
                self.label_names.len(),
                self.label_names.join(", "),
                values.len()
            )));
        }
        Ok(())
    }
}

/// Bounds must be non-empty, finite and strictly ascending.
pub fn validate_buckets(buckets: &[f64]) -> MetricsResult<()> {
    if buckets.is_empty() {
        return Err(MetricsError::InvalidBuckets(
            "at least one bucket bound is required".to_string(),
        ));
    }
    if let Some(bad) = buckets.iter().find(|b| !b.is_finite()) {
        return Err(MetricsError::InvalidBuckets(format!(
            "bound {bad} is not finite; +Inf is implicit"
        )));
    }
    for pair in buckets.windows(2) {
        if pair[0] >= pair[1] {
            return Err(MetricsError::InvalidBuckets(format!(
                "bounds must be strictly ascending, found {} before {}",
                pair[0], pair[1]
            )));
        }
    }
    Ok(())
}

/// One collected time-series value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Sample name: the family name, plus `_bucket`/`_sum`/`_count` for histograms.
    pub name: String,
    /// Values for the family's label names, in schema order.
    pub label_values: Vec<String>,
    /// Upper bound text of a histogram bucket sample (`"+Inf"` for the last).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub le: Option<String>,
    pub value: f64,
}

/// Everything collected for one family.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricFamilySamples {
    pub identity: MetricIdentity,
    pub schema: Schema,
    pub samples: Vec<Sample>,
}

impl MetricFamilySamples {
    pub fn fqname(&self) -> String {
        self.identity.fqname()
    }

    pub fn kind(&self) -> MetricKind {
        self.identity.kind
    }
}
