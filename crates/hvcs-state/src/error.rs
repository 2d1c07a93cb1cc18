use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state key not found: {0}")]
    NotFound(String),

    #[error("state value of {size} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { size: u64, limit: u64 },

    /// Bad key, severity, or category.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("no database connection available after {0:?}")]
    PoolTimeout(Duration),

    #[error("database still busy after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("unsupported schema version {found}, expected {expected}")]
    SchemaVersion { found: i64, expected: i64 },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type StateResult<T> = Result<T, StateError>;

impl StateError {
    /// Lock contention that a retry may clear.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
