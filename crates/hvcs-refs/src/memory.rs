//! In-memory reference store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use hvcs_types::ObjectId;

use crate::error::{RefError, Result};
use crate::names::validate_branch_name;
use crate::traits::RefStore;

/// An in-memory implementation of [`RefStore`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    branches: RwLock<BTreeMap<String, ObjectId>>,
    head: RwLock<Option<String>>,
}

impl InMemoryRefStore {
    /// Create a new empty ref store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl RefStore for InMemoryRefStore {
    fn read_branch(&self, name: &str) -> Result<Option<ObjectId>> {
        validate_branch_name(name)?;
        Ok(self.branches.read().expect("lock poisoned").get(name).copied())
    }

    fn create_branch(&self, name: &str, target: ObjectId) -> Result<()> {
        validate_branch_name(name)?;
        let mut branches = self.branches.write().expect("lock poisoned");
        if branches.contains_key(name) {
            return Err(RefError::AlreadyExists {
                name: name.to_string(),
            });
        }
        branches.insert(name.to_string(), target);
        Ok(())
    }

    fn compare_and_swap(&self, name: &str, expected: Option<ObjectId>, new: ObjectId) -> Result<()> {
        validate_branch_name(name)?;
        let mut branches = self.branches.write().expect("lock poisoned");
        let actual = branches.get(name).copied();
        if actual != expected {
            return Err(RefError::Conflict {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        branches.insert(name.to_string(), new);
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<bool> {
        validate_branch_name(name)?;
        Ok(self.branches.write().expect("lock poisoned").remove(name).is_some())
    }

    fn list_branches(&self) -> Result<Vec<(String, ObjectId)>> {
        let branches = self.branches.read().expect("lock poisoned");
        Ok(branches.iter().map(|(k, v)| (k.clone(), *v)).collect())
    }

    fn head(&self) -> Result<Option<String>> {
        Ok(self.head.read().expect("lock poisoned").clone())
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        *self.head.write().expect("lock poisoned") = Some(branch.to_string());
        Ok(())
    }
}
