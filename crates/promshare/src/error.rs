//! Error types for the metrics registry.

use promshare_store::StoreError;
use thiserror::Error;

/// Result type alias for registry and metric operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors raised by registration, accumulation and collection.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// The identity is already registered with a different schema (or at
    /// all, for a plain `register_*` call).
    #[error("metric {name} is already registered: {reason}")]
    DuplicateMetric { name: String, reason: String },

    #[error("invalid label: {0}")]
    InvalidLabel(String),

    #[error("invalid buckets: {0}")]
    InvalidBuckets(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid metric name: {0}")]
    InvalidName(String),

    #[error("metric not found: {0}")]
    MetricNotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl MetricsError {
    /// The backend could not be reached or used.
    pub fn is_storage_unavailable(&self) -> bool {
        matches!(self, MetricsError::Storage(e) if e.is_unavailable())
    }

    /// A bounded retry loop inside the backend gave up.
    pub fn is_storage_contention(&self) -> bool {
        matches!(self, MetricsError::Storage(e) if e.is_contention())
    }

    pub(crate) fn duplicate(name: &str, reason: impl Into<String>) -> Self {
        MetricsError::DuplicateMetric {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
