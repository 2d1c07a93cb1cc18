use std::collections::BTreeMap;

use hvcs_store::Tree;
use hvcs_types::ObjectId;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IndexError, IndexResult};

/// One pending change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StagedChange {
    /// Point the path at a stored blob.
    Upsert { object_id: ObjectId, size: u64 },
    /// Drop the path from the next tree.
    Remove,
}

/// Check that a path is usable as a tree key.
///
/// Paths are `/`-separated, relative, and free of `.`/`..` components and
/// NUL bytes.
pub fn validate_path(path: &str) -> IndexResult<()> {
    let invalid = |reason: &str| IndexError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    if path.is_empty() {
        return Err(invalid("empty path"));
    }
    if path.contains('\0') {
        return Err(invalid("contains NUL"));
    }
    if path.starts_with('/') {
        return Err(invalid("must be relative"));
    }
    for component in path.split('/') {
        match component {
            "" => return Err(invalid("empty component")),
            "." | ".." => return Err(invalid("dot component")),
            _ => {}
        }
    }
    Ok(())
}

/// Pending changes for one branch.
///
/// Serializes as a JSON object keyed by path.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StagingArea {
    entries: BTreeMap<String, StagedChange>,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&StagedChange> {
        self.entries.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &StagedChange)> {
        self.entries.iter()
    }

    /// Record `path -> object_id`, replacing any pending change for the path.
    pub fn stage(&mut self, path: &str, object_id: ObjectId, size: u64) -> IndexResult<()> {
        validate_path(path)?;
        self.entries
            .insert(path.to_string(), StagedChange::Upsert { object_id, size });
        debug!(path, hash = %object_id.short_hex(), size, "staged");
        Ok(())
    }

    /// Record a removal of `path`.
    pub fn mark_removed(&mut self, path: &str) -> IndexResult<()> {
        validate_path(path)?;
        self.entries.insert(path.to_string(), StagedChange::Remove);
        debug!(path, "staged removal");
        Ok(())
    }

    /// Drop the pending change for `path`.
    pub fn unstage(&mut self, path: &str) -> IndexResult<StagedChange> {
        self.entries
            .remove(path)
            .ok_or_else(|| IndexError::PathNotFound(path.to_string()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove the entries of `committed` that are still unchanged here.
    ///
    /// Paths re-staged after `committed` was taken keep their newer change.
    pub fn clear_committed(&mut self, committed: &StagingArea) {
        for (path, change) in &committed.entries {
            if self.entries.get(path) == Some(change) {
                self.entries.remove(path);
            }
        }
    }

    /// The tree produced by applying every pending change to `base`.
    pub fn apply_to(&self, base: &Tree) -> Tree {
        let mut tree = base.clone();
        for (path, change) in &self.entries {
            match change {
                StagedChange::Upsert { object_id, .. } => {
                    tree.insert(path.clone(), *object_id);
                }
                StagedChange::Remove => {
                    tree.remove(path);
                }
            }
        }
        tree
    }
}
