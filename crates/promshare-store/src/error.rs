//! Error types for promshare storage adapters.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open store: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("contention on {key}: gave up after {attempts} attempts")]
    Contention { key: String, attempts: u32 },
}

impl StoreError {
    /// True when the backend itself could not be reached or used, as opposed
    /// to an exhausted retry loop.
    pub fn is_unavailable(&self) -> bool {
        !self.is_contention()
    }

    /// True when a bounded retry loop gave up.
    pub fn is_contention(&self) -> bool {
        matches!(self, StoreError::Contention { .. })
    }
}
