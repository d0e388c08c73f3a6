//! Error types for the persistence boundary

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, StorageError>;

/// Errors produced by a [`StorageBackend`](crate::storage::StorageBackend)
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying IO failure while reading or writing a snapshot
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized or deserialized
    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure
    #[error("storage backend failed: {0}")]
    Backend(String),
}

impl StorageError {
    /// Create a backend-specific error
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
