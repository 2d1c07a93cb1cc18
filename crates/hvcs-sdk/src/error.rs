//! The public error taxonomy.
//!
//! Lower crates keep their own error enums. Converting into [`SdkError`]
//! lifts the variants callers act on (missing objects, corruption, size caps,
//! lost commit races) into top-level variants and wraps the rest.

use hvcs_history::HistoryError;
use hvcs_index::IndexError;
use hvcs_refs::RefError;
use hvcs_state::StateError;
use hvcs_store::StoreError;
use hvcs_types::{ObjectId, TypeError};
use thiserror::Error;

fn describe(target: &Option<ObjectId>) -> String {
    target.map_or_else(|| "<unborn>".to_string(), |id| id.short_hex())
}

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("repository not initialized at {0}")]
    NotInitialized(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("{what} of {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { what: &'static str, size: u64, limit: u64 },

    #[error(
        "branch {branch} moved during commit: expected {}, found {}",
        describe(.expected),
        describe(.actual)
    )]
    ConcurrentModification {
        branch: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    #[error("nothing to commit on {0}")]
    NoChanges(String),

    #[error("branch {branch} has {staged} uncommitted change(s)")]
    UncommittedChanges { branch: String, staged: usize },

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("ref error: {0}")]
    Ref(RefError),

    #[error("history error: {0}")]
    History(HistoryError),

    #[error("state error: {0}")]
    State(StateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;

impl SdkError {
    /// Whether retrying against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

impl From<StoreError> for SdkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => Self::NotFound(format!("object {id}")),
            StoreError::HashMismatch { id, computed } => {
                Self::Integrity(format!("object {id} hashes to {computed}"))
            }
            StoreError::CorruptObject { id, reason } => {
                Self::Integrity(format!("object {id}: {reason}"))
            }
            StoreError::SizeLimitExceeded { size, limit } => Self::SizeLimitExceeded {
                what: "blob",
                size,
                limit,
            },
            StoreError::Serialization(msg) => Self::Serialization(msg),
            StoreError::InvalidConfig(msg) => Self::Config(msg),
            other => Self::Store(other),
        }
    }
}

impl From<RefError> for SdkError {
    fn from(e: RefError) -> Self {
        match e {
            RefError::NotFound { name } => Self::NotFound(format!("branch {name}")),
            RefError::AlreadyExists { name } => Self::AlreadyExists(format!("branch {name}")),
            RefError::InvalidBranchName { name, reason } => {
                Self::InvalidInput(format!("branch name {name:?}: {reason}"))
            }
            RefError::Conflict {
                name,
                expected,
                actual,
            } => Self::ConcurrentModification {
                branch: name,
                expected,
                actual,
            },
            other => Self::Ref(other),
        }
    }
}

impl From<HistoryError> for SdkError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::NotFound(id) => Self::NotFound(format!("commit {id}")),
            HistoryError::Integrity { id, computed } => {
                Self::Integrity(format!("commit {id} hashes to {computed}"))
            }
            HistoryError::Serialization(msg) => Self::Serialization(msg),
            other => Self::History(other),
        }
    }
}

impl From<StateError> for SdkError {
    fn from(e: StateError) -> Self {
        match e {
            StateError::NotFound(key) => Self::NotFound(format!("state key {key}")),
            StateError::SizeLimitExceeded { size, limit } => Self::SizeLimitExceeded {
                what: "state value",
                size,
                limit,
            },
            StateError::InvalidInput(msg) => Self::InvalidInput(msg),
            StateError::Serialization(msg) => Self::Serialization(msg),
            other => Self::State(other),
        }
    }
}

impl From<IndexError> for SdkError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::PathNotFound(path) => Self::NotFound(format!("staged path {path}")),
            IndexError::InvalidPath { path, reason } => {
                Self::InvalidInput(format!("path {path:?}: {reason}"))
            }
        }
    }
}

impl From<TypeError> for SdkError {
    fn from(e: TypeError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_hash([byte; 32])
    }

    #[test]
    fn store_errors_lift() {
        assert!(matches!(SdkError::from(StoreError::NotFound(id(1))), SdkError::NotFound(_)));
        assert!(matches!(
            SdkError::from(StoreError::HashMismatch { id: id(1), computed: id(2) }),
            SdkError::Integrity(_)
        ));
        assert!(matches!(
            SdkError::from(StoreError::SizeLimitExceeded { size: 10, limit: 5 }),
            SdkError::SizeLimitExceeded { what: "blob", size: 10, limit: 5 }
        ));
    }

    #[test]
    fn ref_conflict_becomes_concurrent_modification() {
        let err = SdkError::from(RefError::Conflict {
            name: "main".into(),
            expected: None,
            actual: Some(id(3)),
        });
        assert!(err.is_retryable());
        let message = err.to_string();
        assert!(message.contains("main"));
        assert!(message.contains("<unborn>"));
    }

    #[test]
    fn state_errors_lift() {
        assert!(matches!(
            SdkError::from(StateError::NotFound("k".into())),
            SdkError::NotFound(_)
        ));
        assert!(matches!(
            SdkError::from(StateError::SizeLimitExceeded { size: 2, limit: 1 }),
            SdkError::SizeLimitExceeded { what: "state value", .. }
        ));
        assert!(matches!(
            SdkError::from(StateError::Serialization("bad".into())),
            SdkError::Serialization(_)
        ));
    }

    #[test]
    fn index_errors_lift() {
        assert!(matches!(
            SdkError::from(IndexError::PathNotFound("a".into())),
            SdkError::NotFound(_)
        ));
        assert!(!SdkError::from(IndexError::PathNotFound("a".into())).is_retryable());
    }
}
