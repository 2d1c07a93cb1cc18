use std::collections::HashMap;
use std::sync::RwLock;

use hvcs_crypto::ContentHasher;
use hvcs_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::stats::{StatsCounter, StoreStats};
use crate::traits::ObjectStore;

/// In-memory, HashMap-based object store.
///
/// Intended for tests and embedding. Blobs are kept uncompressed behind a
/// `RwLock` and cloned on read.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
    max_blob_size: Option<u64>,
    stats: StatsCounter,
}

impl InMemoryObjectStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            max_blob_size: None,
            stats: StatsCounter::default(),
        }
    }

    /// Create a store that rejects payloads above `limit` bytes.
    pub fn with_max_blob_size(limit: u64) -> Self {
        Self {
            max_blob_size: Some(limit),
            ..Self::new()
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, data: &[u8]) -> StoreResult<ObjectId> {
        if let Some(limit) = self.max_blob_size {
            if data.len() as u64 > limit {
                return Err(StoreError::SizeLimitExceeded {
                    size: data.len() as u64,
                    limit,
                });
            }
        }
        let id = ContentHasher::raw_hash(data);
        let mut map = self.objects.write().expect("lock poisoned");
        if map.contains_key(&id) {
            self.stats.record_dedup();
        } else {
            map.insert(id, data.to_vec());
            self.stats.record_write(data.len() as u64, data.len() as u64);
        }
        Ok(id)
    }

    fn get(&self, id: &ObjectId) -> StoreResult<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(id).cloned().ok_or(StoreError::NotFound(*id))
    }

    fn contains(&self, id: &ObjectId) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn stats(&self) -> StoreStats {
        self.stats.snapshot()
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len();
        f.debug_struct("InMemoryObjectStore")
            .field("object_count", &count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let store = InMemoryObjectStore::new();
        let id = store.put(b"hello world").unwrap();
        assert_eq!(store.get(&id).unwrap(), b"hello world");
        assert!(store.contains(&id).unwrap());
    }

    #[test]
    fn same_content_produces_same_id() {
        let store = InMemoryObjectStore::new();
        let id1 = store.put(b"identical content").unwrap();
        let id2 = store.put(b"identical content").unwrap();
        assert_eq!(id1, id2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().dedup_hits, 1);
    }

    #[test]
    fn missing_object_is_not_found() {
        let store = InMemoryObjectStore::new();
        let id = ObjectId::from_bytes(b"missing");
        assert!(!store.contains(&id).unwrap());
        assert!(matches!(store.get(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn default_put_batch_preserves_order() {
        let store = InMemoryObjectStore::new();
        let ids = store
            .put_batch(vec![b"one".to_vec(), b"two".to_vec(), b"one".to_vec()])
            .unwrap();
        assert_eq!(ids[0], ids[2]);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn size_cap_enforced() {
        let store = InMemoryObjectStore::with_max_blob_size(4);
        assert!(store.put(b"1234").is_ok());
        assert!(matches!(
            store.put(b"12345"),
            Err(StoreError::SizeLimitExceeded { size: 5, limit: 4 })
        ));
    }

    #[test]
    fn debug_format() {
        let store = InMemoryObjectStore::new();
        store.put(b"x").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryObjectStore"));
        assert!(debug.contains("object_count"));
    }
}
