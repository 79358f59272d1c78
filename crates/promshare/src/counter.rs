//! Counter: a monotonically non-decreasing value per label set.

use std::sync::Arc;

use tracing::trace;

use crate::codec::RecordTag;
use crate::error::{MetricsError, MetricsResult};
use crate::registry::Binding;
use crate::types::{MetricIdentity, Schema};

/// Handle to a registered counter family. Cheap to clone.
#[derive(Clone)]
pub struct Counter {
    binding: Arc<Binding>,
}

impl Counter {
    pub(crate) fn new(binding: Arc<Binding>) -> Self {
        Self { binding }
    }

    pub fn identity(&self) -> &MetricIdentity {
        &self.binding.identity
    }

    pub fn schema(&self) -> &Schema {
        &self.binding.schema
    }

    /// Increment by one. Returns the new value.
    pub fn inc<S: AsRef<str>>(&self, label_values: &[S]) -> MetricsResult<f64> {
        self.inc_by(1.0, label_values)
    }

    /// Add a non-negative `delta`. Returns the new value.
    pub fn inc_by<S: AsRef<str>>(&self, delta: f64, label_values: &[S]) -> MetricsResult<f64> {
        if !delta.is_finite() || delta < 0.0 {
            return Err(MetricsError::InvalidArgument(format!(
                "counter {} can only increase by a finite non-negative amount, got {delta}",
                self.binding.fqname
            )));
        }
        let key = self.binding.key(label_values, RecordTag::Value)?;
        let value = self.binding.store.add_and_get(&key, delta)?;
        trace!(metric = %self.binding.fqname, delta, value, "counter incremented");
        Ok(value)
    }
}
