use std::sync::Arc;

use hvcs_types::ObjectId;

use crate::error::HistoryResult;
use crate::record::CommitRecord;
use crate::traits::CommitStore;

/// Newest-first walk from a commit back to its root.
///
/// Lazy: each step loads one record. Cloning restarts from the clone's
/// current position. After an error the walk ends.
#[derive(Clone)]
pub struct Ancestors {
    store: Arc<dyn CommitStore>,
    next: Option<ObjectId>,
    remaining: Option<usize>,
}

impl Ancestors {
    /// Walk from `start` (inclusive). `None` yields nothing.
    pub fn new(store: Arc<dyn CommitStore>, start: Option<ObjectId>, limit: Option<usize>) -> Self {
        Self {
            store,
            next: start,
            remaining: limit,
        }
    }
}

impl Iterator for Ancestors {
    type Item = HistoryResult<CommitRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let id = self.next.take()?;
        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        match self.store.get(&id) {
            Ok(record) => {
                self.next = record.parent_hash;
                Some(Ok(record))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::fmt::Debug for Ancestors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ancestors")
            .field("next", &self.next)
            .field("remaining", &self.remaining)
            .finish()
    }
}

/// Number of parent steps from `id` to its root. A root has depth 0.
pub fn depth(store: &dyn CommitStore, id: &ObjectId) -> HistoryResult<usize> {
    let mut steps = 0;
    let mut current = store.get(id)?;
    while let Some(parent) = current.parent_hash {
        current = store.get(&parent)?;
        steps += 1;
    }
    Ok(steps)
}
