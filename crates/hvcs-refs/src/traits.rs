//! The [`RefStore`] trait defining the reference storage interface.

use hvcs_types::ObjectId;

use crate::error::Result;

/// Storage backend for branch pointers and HEAD.
///
/// Implementations must be thread-safe (`Send + Sync`). Every mutation of a
/// single branch is atomic with respect to other mutations through the same
/// store.
pub trait RefStore: Send + Sync {
    /// Tip of `name`, or `Ok(None)` if the branch has no commits.
    fn read_branch(&self, name: &str) -> Result<Option<ObjectId>>;

    /// Create a branch pointing at `target`.
    ///
    /// Fails with `RefError::AlreadyExists` if the name is taken.
    fn create_branch(&self, name: &str, target: ObjectId) -> Result<()>;

    /// Move `name` to `new` only if it currently points at `expected`.
    ///
    /// `expected == None` means the branch must not exist yet. On mismatch
    /// returns `RefError::Conflict` carrying the value actually found.
    fn compare_and_swap(&self, name: &str, expected: Option<ObjectId>, new: ObjectId) -> Result<()>;

    /// Delete a branch. Returns `Ok(true)` if it existed.
    fn delete_branch(&self, name: &str) -> Result<bool>;

    /// All branches with a tip, sorted by name.
    fn list_branches(&self) -> Result<Vec<(String, ObjectId)>>;

    /// Branch named by HEAD, or `Ok(None)` if HEAD has not been set.
    fn head(&self) -> Result<Option<String>>;

    /// Point HEAD at a branch. The branch need not exist yet.
    fn set_head(&self, branch: &str) -> Result<()>;
}
