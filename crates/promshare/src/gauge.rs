//! Gauge: a value that can be set, raised and lowered.

use std::sync::Arc;

use tracing::trace;

use crate::codec::RecordTag;
use crate::error::MetricsResult;
use crate::registry::Binding;
use crate::types::{MetricIdentity, Schema};

/// Handle to a registered gauge family. Cheap to clone.
#[derive(Clone)]
pub struct Gauge {
    binding: Arc<Binding>,
}

impl Gauge {
    pub(crate) fn new(binding: Arc<Binding>) -> Self {
        Self { binding }
    }

    pub fn identity(&self) -> &MetricIdentity {
        &self.binding.identity
    }

    pub fn schema(&self) -> &Schema {
        &self.binding.schema
    }

    /// Overwrite the value. Concurrent writers: last write wins.
    pub fn set<S: AsRef<str>>(&self, value: f64, label_values: &[S]) -> MetricsResult<f64> {
        let key = self.binding.key(label_values, RecordTag::Value)?;
        let value = self.binding.store.set_and_get(&key, value)?;
        trace!(metric = %self.binding.fqname, value, "gauge set");
        Ok(value)
    }

    pub fn inc<S: AsRef<str>>(&self, label_values: &[S]) -> MetricsResult<f64> {
        self.inc_by(1.0, label_values)
    }

    pub fn dec<S: AsRef<str>>(&self, label_values: &[S]) -> MetricsResult<f64> {
        self.inc_by(-1.0, label_values)
    }

    pub fn dec_by<S: AsRef<str>>(&self, delta: f64, label_values: &[S]) -> MetricsResult<f64> {
        self.inc_by(-delta, label_values)
    }

    /// Add `delta` (which may be negative). Returns the new value.
    pub fn inc_by<S: AsRef<str>>(&self, delta: f64, label_values: &[S]) -> MetricsResult<f64> {
        let key = self.binding.key(label_values, RecordTag::Value)?;
        let value = self.binding.store.add_and_get(&key, delta)?;
        trace!(metric = %self.binding.fqname, delta, value, "gauge adjusted");
        Ok(value)
    }
}
