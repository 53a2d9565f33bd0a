use thiserror::Error;

/// Result type for codegraph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for codegraph operations
#[derive(Error, Debug)]
pub enum Error {
    /// I/O related errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or unsupported source input. Non-fatal and scoped to one file.
    #[error("Parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// A graph or vector store could not be reached. Retried with backoff.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A store rejected an operation for a reason retrying will not fix
    #[error("Storage error: {0}")]
    Storage(String),

    /// Embedding endpoint errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// An incoming node identity is already stored for another file
    #[error("Stale identity conflict on {id}: stored for {existing_file}, written by {incoming_file}")]
    StaleIdentityConflict {
        id: String,
        existing_file: String,
        incoming_file: String,
    },

    /// File watching errors
    #[error("Watcher error: {0}")]
    Watcher(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Creates a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a parse error
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Creates a store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Creates a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates an embedding error
    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    /// Creates a stale identity conflict
    pub fn stale_identity_conflict(
        id: impl Into<String>,
        existing_file: impl Into<String>,
        incoming_file: impl Into<String>,
    ) -> Self {
        Self::StaleIdentityConflict {
            id: id.into(),
            existing_file: existing_file.into(),
            incoming_file: incoming_file.into(),
        }
    }

    /// Creates a watcher error
    pub fn watcher(msg: impl Into<String>) -> Self {
        Self::Watcher(msg.into())
    }

    /// Creates an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Adds context to any error
    pub fn with_context<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::WithContext {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Whether retrying the failed operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionRefused
            ),
            Self::WithContext { source, .. } => source
                .downcast_ref::<Error>()
                .is_some_and(Error::is_retryable),
            _ => false,
        }
    }

    /// Short machine-readable label used in reports and logs
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Config(_) => "config",
            Self::Parse { .. } => "parse_failure",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Storage(_) => "storage",
            Self::Embedding(_) => "embedding_failure",
            Self::StaleIdentityConflict { .. } => "stale_identity_conflict",
            Self::Watcher(_) => "watcher",
            Self::InvalidInput(_) => "invalid_input",
            Self::WithContext { .. } => "with_context",
            Self::Other(_) => "other",
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::with_context(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_unavailable_is_retryable() {
        assert!(Error::store_unavailable("connection refused").is_retryable());
        assert!(!Error::storage("bad query").is_retryable());
        assert!(!Error::parse("a.rs", "unexpected token").is_retryable());
    }

    #[test]
    fn test_context_preserves_retryability() {
        let err = Error::with_context("merging a.rs", Error::store_unavailable("down"));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "merging a.rs: Store unavailable: down");
    }

    #[test]
    fn test_io_timeout_is_retryable() {
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow"));
        assert!(err.is_retryable());
        let err = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(Error::embedding("x").kind_label(), "embedding_failure");
        assert_eq!(
            Error::stale_identity_conflict("sym-1", "a.rs", "b.rs").kind_label(),
            "stale_identity_conflict"
        );
    }
}
