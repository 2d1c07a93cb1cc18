//! Error types for the commit graph.

use hvcs_types::ObjectId;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// No commit with this hash.
    #[error("commit not found: {0}")]
    NotFound(ObjectId),

    /// A stored commit does not hash to its own identity.
    #[error("commit {id} failed verification: fields hash to {computed}")]
    Integrity { id: ObjectId, computed: ObjectId },

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Storage I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for history results.
pub type HistoryResult<T> = Result<T, HistoryError>;
