//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
///
/// Every variant means the store could not read or durably write its
/// state. The last committed state is still intact when one is returned,
/// so callers may retry.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (file system).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Failure reported by a custom backend.
    #[error("backend error: {0}")]
    Backend(String),
}
