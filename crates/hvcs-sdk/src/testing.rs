//! Deterministic commit races for unit tests.

use std::sync::{Arc, Mutex};

use hvcs_history::{CommitRecord, CommitStore, InMemoryCommitStore};
use hvcs_refs::{InMemoryRefStore, RefStore, Result as RefResult};
use hvcs_state::StateStore;
use hvcs_store::{InMemoryObjectStore, Tree};
use hvcs_types::ObjectId;

use crate::config::RepoConfig;
use crate::repository::{Repository, STATE_DB};

/// Ref store that lets another writer win the next compare-and-swap.
#[derive(Debug, Default)]
pub(crate) struct RacingRefs {
    inner: InMemoryRefStore,
    pending: Mutex<Option<ObjectId>>,
}

impl RefStore for RacingRefs {
    fn read_branch(&self, name: &str) -> RefResult<Option<ObjectId>> {
        self.inner.read_branch(name)
    }

    fn create_branch(&self, name: &str, target: ObjectId) -> RefResult<()> {
        self.inner.create_branch(name, target)
    }

    fn compare_and_swap(&self, name: &str, expected: Option<ObjectId>, new: ObjectId) -> RefResult<()> {
        if let Some(winner) = self.pending.lock().expect("lock poisoned").take() {
            self.inner.compare_and_swap(name, expected, winner)?;
        }
        self.inner.compare_and_swap(name, expected, new)
    }

    fn delete_branch(&self, name: &str) -> RefResult<bool> {
        self.inner.delete_branch(name)
    }

    fn list_branches(&self) -> RefResult<Vec<(String, ObjectId)>> {
        self.inner.list_branches()
    }

    fn head(&self) -> RefResult<Option<String>> {
        self.inner.head()
    }

    fn set_head(&self, branch: &str) -> RefResult<()> {
        self.inner.set_head(branch)
    }
}

/// In-memory repository whose next commit on a branch loses to a rival.
pub(crate) struct Race {
    pub _dir: tempfile::TempDir,
    pub repo: Repository,
    refs: Arc<RacingRefs>,
    commits: Arc<InMemoryCommitStore>,
}

impl Race {
    pub fn new() -> Self {
        Self::with_config(RepoConfig::default())
    }

    pub fn with_config(config: RepoConfig) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let refs = Arc::new(RacingRefs::default());
        let commits = Arc::new(InMemoryCommitStore::new());
        let state = StateStore::open(&dir.path().join(STATE_DB), config.state_config()).unwrap();
        let repo = Repository::with_backends(
            dir.path(),
            config,
            Arc::new(InMemoryObjectStore::new()),
            commits.clone(),
            refs.clone(),
            state,
        )
        .unwrap();
        Self {
            _dir: dir,
            repo,
            refs,
            commits,
        }
    }

    /// Prepare a rival commit writing `files` on top of `branch`'s current
    /// head. It lands just before the next compare-and-swap.
    pub fn rival(&self, branch: &str, files: &[(&str, &[u8])]) -> ObjectId {
        let parent = self.refs.read_branch(branch).unwrap();
        let mut tree = match &parent {
            Some(head) => self.repo.tree_at(head).unwrap(),
            None => Tree::new(),
        };
        for (path, content) in files {
            tree.insert(*path, self.repo.objects().put(content).unwrap());
        }
        let tree_hash = tree.write_to(self.repo.objects()).unwrap();
        let record = CommitRecord::new(parent, tree_hash, "rival", "concurrent write", 1_700_000_000_000);
        self.commits.put(&record).unwrap();
        *self.refs.pending.lock().unwrap() = Some(record.commit_hash);
        record.commit_hash
    }
}
