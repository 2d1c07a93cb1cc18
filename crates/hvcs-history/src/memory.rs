use std::collections::HashMap;
use std::sync::RwLock;

use hvcs_types::ObjectId;

use crate::error::{HistoryError, HistoryResult};
use crate::record::CommitRecord;
use crate::traits::CommitStore;

/// HashMap-backed commit store for tests and embedding.
#[derive(Debug, Default)]
pub struct InMemoryCommitStore {
    commits: RwLock<HashMap<ObjectId, CommitRecord>>,
}

impl InMemoryCommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commits.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CommitStore for InMemoryCommitStore {
    fn put(&self, record: &CommitRecord) -> HistoryResult<()> {
        record.verify()?;
        self.commits
            .write()
            .expect("lock poisoned")
            .entry(record.commit_hash)
            .or_insert_with(|| record.clone());
        Ok(())
    }

    fn get(&self, id: &ObjectId) -> HistoryResult<CommitRecord> {
        self.commits
            .read()
            .expect("lock poisoned")
            .get(id)
            .cloned()
            .ok_or(HistoryError::NotFound(*id))
    }

    fn contains(&self, id: &ObjectId) -> HistoryResult<bool> {
        Ok(self.commits.read().expect("lock poisoned").contains_key(id))
    }
}
