//! LabelCodec: storage key layout for metric records.
//!
//! ```text
//! {prefix}:{kind}:{fqname}:{labels}:{tag}
//!
//! labels = hex(JSON array of label values)
//! tag    = "value" | "sum" | "bucket={bound}"
//!
//! {prefix}:meta:{fqname}   schema document (metadata keyspace)
//! ```
//!
//! Label values are JSON-encoded then hex-encoded so that arbitrary text
//! (colons, quotes, newlines) never collides with the separators. Metric
//! names may contain colons, so decoding splits the tail from the right.
//! Prefixes may not, so no namespace's scan prefix covers another's keys.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{MetricsError, MetricsResult};
use crate::registry::DEFAULT_PREFIX;
use crate::types::MetricKind;

static PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_.-]+$").expect("key prefix pattern"));

/// Which record of a series a key addresses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecordTag {
    /// The single value of a counter or gauge series.
    Value,
    /// A histogram's running sum.
    Sum,
    /// A histogram bucket's cumulative count; `f64::INFINITY` for `+Inf`.
    Bucket(f64),
}

impl RecordTag {
    fn encode(&self) -> String {
        match self {
            RecordTag::Value => "value".to_string(),
            RecordTag::Sum => "sum".to_string(),
            RecordTag::Bucket(bound) if bound.is_infinite() => "bucket=+Inf".to_string(),
            RecordTag::Bucket(bound) => format!("bucket={bound}"),
        }
    }

    fn decode(s: &str) -> Option<Self> {
        match s {
            "value" => Some(RecordTag::Value),
            "sum" => Some(RecordTag::Sum),
            _ => {
                let bound = s.strip_prefix("bucket=")?;
                if bound == "+Inf" {
                    return Some(RecordTag::Bucket(f64::INFINITY));
                }
                bound
                    .parse::<f64>()
                    .ok()
                    .filter(|b| b.is_finite())
                    .map(RecordTag::Bucket)
            }
        }
    }
}

/// A storage key taken apart again.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedKey {
    pub kind: MetricKind,
    pub fqname: String,
    pub label_values: Vec<String>,
    pub tag: RecordTag,
}

/// Builds and parses the storage keys of one registry namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    prefix: String,
}

impl KeyCodec {
    /// Codec for the namespace `prefix`: non-empty, ASCII letters, digits,
    /// `_`, `.` and `-` only.
    pub fn new(prefix: &str) -> MetricsResult<Self> {
        if !PREFIX.is_match(prefix) {
            return Err(MetricsError::InvalidArgument(format!(
                "storage prefix {prefix:?} must be non-empty and match [a-zA-Z0-9_.-]+"
            )));
        }
        Ok(Self {
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scan prefix covering every record of this namespace.
    pub fn scan_prefix(&self) -> String {
        format!("{}:", self.prefix)
    }

    /// Scan prefix covering the schema documents of this namespace.
    pub fn meta_prefix(&self) -> String {
        format!("{}:meta:", self.prefix)
    }

    pub fn meta_key(&self, fqname: &str) -> String {
        format!("{}{fqname}", self.meta_prefix())
    }

    pub fn encode<S: AsRef<str>>(
        &self,
        kind: MetricKind,
        fqname: &str,
        label_values: &[S],
        tag: RecordTag,
    ) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.prefix,
            kind.as_str(),
            fqname,
            encode_labels(label_values),
            tag.encode()
        )
    }

    /// Parse a key produced by [`encode`](Self::encode). Returns `None` for
    /// anything that is not a well-formed key of this namespace.
    pub fn decode(&self, key: &str) -> Option<DecodedKey> {
        let rest = key.strip_prefix(&self.prefix)?.strip_prefix(':')?;
        let (kind, rest) = rest.split_once(':')?;
        let kind = MetricKind::parse(kind)?;

        let mut tail = rest.rsplitn(3, ':');
        let tag = RecordTag::decode(tail.next()?)?;
        let label_values = decode_labels(tail.next()?)?;
        let fqname = tail.next().filter(|n| !n.is_empty())?;

        Some(DecodedKey {
            kind,
            fqname: fqname.to_string(),
            label_values,
            tag,
        })
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

fn encode_labels<S: AsRef<str>>(values: &[S]) -> String {
    let array = Value::Array(
        values
            .iter()
            .map(|v| Value::String(v.as_ref().to_string()))
            .collect(),
    );
    hex::encode(array.to_string())
}

fn decode_labels(encoded: &str) -> Option<Vec<String>> {
    let bytes = hex::decode(encoded).ok()?;
    serde_json::from_slice(&bytes).ok()
}
