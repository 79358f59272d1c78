//! Histogram: cumulative bucket counts plus a running sum.
//!
//! An observation increments every bucket whose upper bound is at or above
//! the observed value, always including the implicit `+Inf` bucket, then
//! adds the value to the sum. `_count` is not stored: it is read back from
//! the `+Inf` bucket at collection time.
//!
//! Each of those writes is a separate atomic operation. A concurrent
//! collection can therefore see an observation in some buckets but not yet
//! in others or in the sum.

use std::sync::Arc;

use tracing::trace;

use crate::codec::RecordTag;
use crate::error::{MetricsError, MetricsResult};
use crate::registry::Binding;
use crate::types::{MetricIdentity, Schema};

/// Handle to a registered histogram family. Cheap to clone.
#[derive(Clone)]
pub struct Histogram {
    binding: Arc<Binding>,
}

impl Histogram {
    pub(crate) fn new(binding: Arc<Binding>) -> Self {
        Self { binding }
    }

    pub fn identity(&self) -> &MetricIdentity {
        &self.binding.identity
    }

    pub fn schema(&self) -> &Schema {
        &self.binding.schema
    }

    /// Finite bucket bounds, ascending. `+Inf` is implicit.
    pub fn buckets(&self) -> &[f64] {
        &self.binding.schema.buckets
    }

    /// Record one observation.
    pub fn observe<S: AsRef<str>>(&self, value: f64, label_values: &[S]) -> MetricsResult<()> {
        if value.is_nan() {
            return Err(MetricsError::InvalidArgument(format!(
                "histogram {} cannot observe NaN",
                self.binding.fqname
            )));
        }
        self.binding.schema.check_values(label_values)?;

        let bounds = self
            .buckets()
            .iter()
            .copied()
            .filter(|bound| value <= *bound)
            .chain(std::iter::once(f64::INFINITY));
        for bound in bounds {
            let key = self.binding.key(label_values, RecordTag::Bucket(bound))?;
            self.binding.store.add_and_get(&key, 1.0)?;
        }

        let key = self.binding.key(label_values, RecordTag::Sum)?;
        let sum = self.binding.store.add_and_get(&key, value)?;
        trace!(metric = %self.binding.fqname, value, sum, "histogram observed");
        Ok(())
    }
}
