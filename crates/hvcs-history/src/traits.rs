use hvcs_types::ObjectId;

use crate::error::HistoryResult;
use crate::record::CommitRecord;

/// Append-only commit storage keyed by commit hash.
pub trait CommitStore: Send + Sync {
    /// Persist a commit. Writing an existing commit is a no-op.
    fn put(&self, record: &CommitRecord) -> HistoryResult<()>;

    /// Load and verify a commit. `HistoryError::NotFound` if absent.
    fn get(&self, id: &ObjectId) -> HistoryResult<CommitRecord>;

    fn contains(&self, id: &ObjectId) -> HistoryResult<bool>;
}
