//! Error types for the index crate.

/// Errors that can occur during staging operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The specified path has no pending change.
    #[error("path not staged: {0}")]
    PathNotFound(String),

    /// An invalid path was provided.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
