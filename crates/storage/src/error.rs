use codegraph_core::Error as CoreError;
use thiserror::Error;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Invalid vector dimensions: expected {expected}, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    /// Whether the backend could not be reached at all
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout(_))
    }
}

impl From<StorageError> for CoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidConfig(msg) => CoreError::config(msg),
            err if err.is_unavailable() => CoreError::store_unavailable(err.to_string()),
            err => CoreError::storage(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failures_become_retryable() {
        let err: CoreError = StorageError::ConnectionFailed("refused".to_string()).into();
        assert!(err.is_retryable());
        assert_eq!(err.kind_label(), "store_unavailable");

        let err: CoreError = StorageError::BackendError("syntax error".to_string()).into();
        assert!(!err.is_retryable());
        assert_eq!(err.kind_label(), "storage");
    }
}
