//! Error types for reference operations.

use hvcs_types::ObjectId;
use thiserror::Error;

fn describe(target: &Option<ObjectId>) -> String {
    target.map_or_else(|| "<none>".to_string(), |id| id.short_hex())
}

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The branch was not found.
    #[error("branch not found: {name}")]
    NotFound { name: String },

    /// A branch with this name already exists.
    #[error("branch already exists: {name}")]
    AlreadyExists { name: String },

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// Compare-and-swap lost: the branch moved since it was read.
    #[error(
        "branch {name} moved: expected {}, found {}",
        describe(.expected),
        describe(.actual)
    )]
    Conflict {
        name: String,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    /// HEAD or a ref file has unparseable contents.
    #[error("malformed ref {name}: {reason}")]
    Malformed { name: String, reason: String },

    /// Another writer held the ref's lock file for too long.
    #[error("ref is locked: {path} exists")]
    Locked { path: String },

    /// I/O error during file-based ref operations.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
