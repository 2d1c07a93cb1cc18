use hvcs_types::ObjectId;

use crate::error::StoreResult;
use crate::stats::StoreStats;

/// Content-addressed blob store.
///
/// All implementations must satisfy these invariants:
/// - The ID of a blob is the SHA-256 of its uncompressed bytes.
/// - `put` of content already present is a no-op returning the same ID.
/// - `get` never returns bytes whose hash differs from the requested ID.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Store `data` and return its content-addressed ID.
    fn put(&self, data: &[u8]) -> StoreResult<ObjectId>;

    /// Read a blob back, verified against its ID.
    ///
    /// Returns `StoreError::NotFound` if absent and `StoreError::HashMismatch`
    /// on corruption.
    fn get(&self, id: &ObjectId) -> StoreResult<Vec<u8>>;

    /// Check whether a blob exists without reading its payload.
    fn contains(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Store many blobs and return their IDs in input order.
    ///
    /// Default implementation calls `put()` for each item. Backends may
    /// override to compress in parallel.
    fn put_batch(&self, items: Vec<Vec<u8>>) -> StoreResult<Vec<ObjectId>> {
        items.iter().map(|data| self.put(data)).collect()
    }

    /// Write counters since the store was opened.
    fn stats(&self) -> StoreStats;
}
