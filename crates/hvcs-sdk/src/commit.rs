use std::sync::Arc;

use hvcs_history::{Ancestors, CommitRecord, CommitStore};
use hvcs_index::StagingArea;
use hvcs_refs::BranchInfo;
use hvcs_store::{ObjectStore, Tree};
use hvcs_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::SdkResult;

/// Options for [`Repository::commit_with`](crate::Repository::commit_with).
#[derive(Clone, Debug)]
pub struct CommitOptions {
    pub message: String,
    pub author: String,
    /// Commit even when the tree would not change.
    pub allow_empty: bool,
    /// Milliseconds since the Unix epoch. Defaults to now.
    pub timestamp_ms: Option<i64>,
}

impl CommitOptions {
    pub fn new(message: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: author.into(),
            allow_empty: false,
            timestamp_ms: None,
        }
    }

    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }

    pub fn at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// A commit whose tree is written but whose branch has not moved yet.
///
/// Produced by `prepare_commit` outside any lock, consumed by
/// `finalize_commit` inside the branch critical section.
#[derive(Clone, Debug)]
pub struct PreparedCommit {
    pub branch: String,
    pub record: CommitRecord,
    /// The staged entries this commit consumes.
    pub staged: StagingArea,
    pub changed_paths: Vec<String>,
}

impl PreparedCommit {
    pub fn commit_hash(&self) -> ObjectId {
        self.record.commit_hash
    }

    pub fn parent(&self) -> Option<ObjectId> {
        self.record.parent_hash
    }
}

/// Snapshot of the repository as reported by `status`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    pub branch: String,
    pub staged_count: usize,
    pub head_commit_hash: Option<ObjectId>,
    /// Commits reachable from the head, 0 while the branch is unborn.
    pub history_length: usize,
    pub branches: Vec<BranchInfo>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub commit_hash: ObjectId,
    pub parent_hash: Option<ObjectId>,
    pub tree_hash: ObjectId,
    pub author: String,
    pub message: String,
    pub timestamp_ms: i64,
    /// Paths added, modified, or removed relative to the parent.
    pub changed_paths: Vec<String>,
}

/// Lazy newest-first history of one branch.
///
/// Each step loads one commit and diffs its tree against its parent's.
/// Clone to restart from the current position.
#[derive(Clone)]
pub struct History {
    ancestors: Ancestors,
    commits: Arc<dyn CommitStore>,
    objects: Arc<dyn ObjectStore>,
    // Tree of the previously yielded commit's parent.
    cached: Option<(ObjectId, Tree)>,
}

impl History {
    pub(crate) fn new(
        commits: Arc<dyn CommitStore>,
        objects: Arc<dyn ObjectStore>,
        start: Option<ObjectId>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            ancestors: Ancestors::new(Arc::clone(&commits), start, limit),
            commits,
            objects,
            cached: None,
        }
    }

    fn tree(&mut self, tree_hash: &ObjectId) -> SdkResult<Tree> {
        match &self.cached {
            Some((hash, tree)) if hash == tree_hash => Ok(tree.clone()),
            _ => Ok(Tree::read_from(self.objects.as_ref(), tree_hash)?),
        }
    }

    fn entry(&mut self, record: CommitRecord) -> SdkResult<HistoryEntry> {
        let tree = self.tree(&record.tree_hash)?;
        let parent_tree = match &record.parent_hash {
            Some(parent) => {
                let parent = self.commits.get(parent)?;
                let parent_tree = Tree::read_from(self.objects.as_ref(), &parent.tree_hash)?;
                self.cached = Some((parent.tree_hash, parent_tree.clone()));
                parent_tree
            }
            None => Tree::new(),
        };
        Ok(HistoryEntry {
            changed_paths: tree.changed_paths(&parent_tree),
            commit_hash: record.commit_hash,
            parent_hash: record.parent_hash,
            tree_hash: record.tree_hash,
            author: record.author,
            message: record.message,
            timestamp_ms: record.timestamp_ms,
        })
    }
}

impl Iterator for History {
    type Item = SdkResult<HistoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.ancestors.next()? {
            Ok(record) => Some(self.entry(record)),
            Err(e) => Some(Err(e.into())),
        }
    }
}

impl std::fmt::Debug for History {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History").field("ancestors", &self.ancestors).finish()
    }
}
