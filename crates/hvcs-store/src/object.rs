use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use hvcs_crypto::ContentHasher;
use hvcs_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::traits::ObjectStore;

// ---------------------------------------------------------------------------
// Tree
// ---------------------------------------------------------------------------

/// Full file set at a commit: path to blob ID.
///
/// Serialized as canonical JSON with sorted keys, so equal maps always hash
/// to the same ID. The tree is stored as an ordinary blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    entries: BTreeMap<String, ObjectId>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: BTreeMap<String, ObjectId>) -> Self {
        Self { entries }
    }

    /// Insert or replace a path. Returns the previous blob ID.
    pub fn insert(&mut self, path: impl Into<String>, id: ObjectId) -> Option<ObjectId> {
        self.entries.insert(path.into(), id)
    }

    pub fn remove(&mut self, path: &str) -> Option<ObjectId> {
        self.entries.remove(path)
    }

    pub fn get(&self, path: &str) -> Option<&ObjectId> {
        self.entries.get(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ObjectId)> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &BTreeMap<String, ObjectId> {
        &self.entries
    }

    /// Canonical serialized form.
    pub fn to_bytes(&self) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Decode a tree read from blob `id`.
    pub fn from_bytes(id: &ObjectId, bytes: &[u8]) -> StoreResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::CorruptObject {
            id: *id,
            reason: format!("not a tree: {e}"),
        })
    }

    /// The ID this tree has (or would have) in any store.
    pub fn id(&self) -> StoreResult<ObjectId> {
        Ok(ContentHasher::raw_hash(&self.to_bytes()?))
    }

    /// Store the tree and return its ID.
    pub fn write_to(&self, store: &dyn ObjectStore) -> StoreResult<ObjectId> {
        store.put(&self.to_bytes()?)
    }

    /// Load and decode the tree stored at `id`.
    pub fn read_from(store: &dyn ObjectStore, id: &ObjectId) -> StoreResult<Self> {
        let bytes = store.get(id)?;
        Self::from_bytes(id, &bytes)
    }

    /// Paths whose blob differs between `self` and `other`, including paths
    /// present in only one of them.
    pub fn changed_paths(&self, other: &Tree) -> Vec<String> {
        let mut changed: Vec<String> = self
            .entries
            .iter()
            .filter(|(path, id)| other.entries.get(*path) != Some(*id))
            .map(|(path, _)| path.clone())
            .collect();
        changed.extend(
            other
                .entries
                .keys()
                .filter(|path| !self.entries.contains_key(*path))
                .cloned(),
        );
        changed.sort();
        changed
    }
}

impl FromIterator<(String, ObjectId)> for Tree {
    fn from_iter<I: IntoIterator<Item = (String, ObjectId)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
