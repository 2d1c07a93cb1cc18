use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use chrono::Utc;
use hvcs_history::{CommitRecord, CommitStore, FsCommitStore};
use hvcs_index::{validate_path, StagedChange, StagingArea};
use hvcs_refs::{BranchInfo, FsRefStore, RefError, RefStore};
use hvcs_state::{FeedbackRecord, StateStore, StateValue};
use hvcs_store::{FsObjectStore, ObjectStore, StoreStats, Tree};
use hvcs_types::ObjectId;
use tracing::{debug, info, warn};

use crate::commit::{CommitOptions, History, PreparedCommit, RepositoryStatus};
use crate::config::{RepoConfig, CONFIG_FILE};
use crate::error::{SdkError, SdkResult};
use crate::ingest::backoff;
use crate::staging::{FsStagingStore, InMemoryStagingStore, StagingStore};

pub const OBJECTS_DIR: &str = "objects";
pub const COMMITS_DIR: &str = "commits";
pub const STAGING_DIR: &str = "staging";
pub const STATE_DB: &str = "state.db";

/// A hybrid VCS repository.
///
/// Owns one object namespace, one set of branches, and the active branch.
/// Shareable across threads behind an `Arc`: commits are serialized per
/// branch, everything else is safe to call concurrently. Several handles on
/// the same directory, in one process or many, share branches and staged
/// changes through lock files.
pub struct Repository {
    root: PathBuf,
    config: RepoConfig,
    objects: Arc<dyn ObjectStore>,
    commits: Arc<dyn CommitStore>,
    refs: Arc<dyn RefStore>,
    state: StateStore,
    staging: Arc<dyn StagingStore>,
    // Held while staging or while the active branch changes.
    head_lock: Mutex<()>,
    branch_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Repository {
    /// Create (or reopen) a repository at `path`, using `hvcs.toml` there if present.
    pub fn init(path: impl AsRef<Path>) -> SdkResult<Self> {
        let root = path.as_ref();
        let config = RepoConfig::load(root)?;
        Self::init_with_config(root, config)
    }

    /// Create a repository at `path`, writing `config` as its `hvcs.toml`
    /// unless one already exists.
    pub fn init_with_config(path: impl AsRef<Path>, config: RepoConfig) -> SdkResult<Self> {
        let root = path.as_ref();
        config.validate()?;
        fs::create_dir_all(root)?;
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            fs::write(&config_path, config.to_toml_string()?)?;
        }
        let repo = Self::open_with_config(root, config)?;
        info!(root = %root.display(), branch = %repo.current_branch()?, "repository initialized");
        Ok(repo)
    }

    /// Open an existing repository.
    pub fn open(path: impl AsRef<Path>) -> SdkResult<Self> {
        let root = path.as_ref();
        if !root.join("HEAD").is_file() {
            return Err(SdkError::NotInitialized(root.display().to_string()));
        }
        let config = RepoConfig::load(root)?;
        Self::open_with_config(root, config)
    }

    /// Open the repository named by `$HYBRID_VCS`.
    pub fn open_from_env() -> SdkResult<Self> {
        Self::open(RepoConfig::repo_dir_from_env())
    }

    fn open_with_config(root: &Path, config: RepoConfig) -> SdkResult<Self> {
        let objects = FsObjectStore::open(root.join(OBJECTS_DIR), config.store_config())?;
        let commits = FsCommitStore::open(root.join(COMMITS_DIR), config.bucket_prefix_len)?;
        let refs = FsRefStore::open(root)?;
        let staging = FsStagingStore::open(root.join(STAGING_DIR))?;
        let state = StateStore::open(&root.join(STATE_DB), config.state_config())?;
        Self::with_backends(
            root,
            config,
            Arc::new(objects),
            Arc::new(commits),
            Arc::new(refs),
            state,
        )
        .map(|repo| repo.with_staging_store(Arc::new(staging)))
    }

    /// Assemble a repository from explicit backends.
    ///
    /// Staged changes are kept in memory until
    /// [`with_staging_store`](Self::with_staging_store) says otherwise. Points
    /// HEAD at the configured default branch if it is unset.
    pub fn with_backends(
        root: impl Into<PathBuf>,
        config: RepoConfig,
        objects: Arc<dyn ObjectStore>,
        commits: Arc<dyn CommitStore>,
        refs: Arc<dyn RefStore>,
        state: StateStore,
    ) -> SdkResult<Self> {
        config.validate()?;
        if refs.head()?.is_none() {
            refs.set_head(&config.default_branch)?;
        }
        Ok(Self {
            root: root.into(),
            config,
            objects,
            commits,
            refs,
            state,
            staging: Arc::new(InMemoryStagingStore::new()),
            head_lock: Mutex::new(()),
            branch_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_staging_store(mut self, staging: Arc<dyn StagingStore>) -> Self {
        self.staging = staging;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    /// Running object store counters.
    pub fn stats(&self) -> StoreStats {
        self.objects.stats()
    }

    fn head_lock(&self) -> MutexGuard<'_, ()> {
        self.head_lock.lock().expect("head lock poisoned")
    }

    fn branch_lock(&self, branch: &str) -> Arc<Mutex<()>> {
        let mut locks = self.branch_locks.lock().expect("lock poisoned");
        Arc::clone(locks.entry(branch.to_string()).or_default())
    }

    pub(crate) fn tree_at(&self, commit: &ObjectId) -> SdkResult<Tree> {
        let record = self.commits.get(commit)?;
        Ok(Tree::read_from(self.objects.as_ref(), &record.tree_hash)?)
    }

    pub(crate) fn read_branch(&self, branch: &str) -> SdkResult<Option<ObjectId>> {
        Ok(self.refs.read_branch(branch)?)
    }

    // ---- Staging ----

    /// Store `content` and record it as the pending version of `path`.
    pub fn stage(&self, path: &str, content: &[u8]) -> SdkResult<ObjectId> {
        validate_path(path)?;
        let id = self.objects.put(content)?;

        let _head = self.head_lock();
        let branch = self.current_branch()?;
        let size = content.len() as u64;
        self.staging
            .update(&branch, &mut |area| Ok(area.stage(path, id, size)?))?;
        debug!(branch = %branch, path, hash = %id.short_hex(), "staged");
        Ok(id)
    }

    /// Stage several files, compressing new payloads in parallel.
    pub fn stage_many(&self, files: Vec<(String, Vec<u8>)>) -> SdkResult<Vec<ObjectId>> {
        if files.is_empty() {
            return Err(SdkError::InvalidInput("no files to stage".into()));
        }
        for (path, _) in &files {
            validate_path(path)?;
        }
        let sizes: Vec<u64> = files.iter().map(|(_, c)| c.len() as u64).collect();
        let (paths, contents): (Vec<String>, Vec<Vec<u8>>) = files.into_iter().unzip();
        let ids = self.objects.put_batch(contents)?;

        let _head = self.head_lock();
        let branch = self.current_branch()?;
        self.staging.update(&branch, &mut |area| {
            for ((path, id), size) in paths.iter().zip(&ids).zip(&sizes) {
                area.stage(path, *id, *size)?;
            }
            Ok(())
        })?;
        debug!(branch = %branch, files = ids.len(), "staged batch");
        Ok(ids)
    }

    /// Stage `files` and commit them in one step.
    pub fn save_version(
        &self,
        files: Vec<(String, Vec<u8>)>,
        message: &str,
        author: &str,
    ) -> SdkResult<ObjectId> {
        self.stage_many(files)?;
        self.commit(message, author)
    }

    /// Stage the deletion of `path`.
    ///
    /// A path that only exists as a pending addition is simply unstaged.
    pub fn remove(&self, path: &str) -> SdkResult<()> {
        validate_path(path)?;
        let _head = self.head_lock();
        let branch = self.current_branch()?;
        let tracked = match self.refs.read_branch(&branch)? {
            Some(head) => self.tree_at(&head)?.get(path).is_some(),
            None => false,
        };
        self.staging.update(&branch, &mut |area| {
            if tracked {
                area.mark_removed(path)?;
            } else if matches!(area.get(path), Some(StagedChange::Upsert { .. })) {
                area.unstage(path)?;
            } else {
                return Err(SdkError::NotFound(format!("path {path}")));
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Drop the pending change for `path`.
    pub fn unstage(&self, path: &str) -> SdkResult<()> {
        let _head = self.head_lock();
        let branch = self.current_branch()?;
        self.staging.update(&branch, &mut |area| {
            area.unstage(path)?;
            Ok(())
        })?;
        Ok(())
    }

    /// A copy of the active branch's pending changes.
    pub fn staged(&self) -> SdkResult<StagingArea> {
        self.staging.load(&self.current_branch()?)
    }

    // ---- Commits ----

    pub fn commit(&self, message: &str, author: &str) -> SdkResult<ObjectId> {
        self.commit_with(CommitOptions::new(message, author))
    }

    /// Commit the active branch's staged changes.
    ///
    /// Fails with `NoChanges` when the tree would not change, unless
    /// `allow_empty` is set. If another writer advances the branch while the
    /// tree is being built, the commit is rebuilt on the new head up to
    /// `max_commit_retries` times before `ConcurrentModification` surfaces.
    /// When the winning writer already committed every staged entry, its
    /// commit is returned.
    pub fn commit_with(&self, options: CommitOptions) -> SdkResult<ObjectId> {
        let branch = self.current_branch()?;
        let max_retries = self.config.max_commit_retries;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let snapshot = self.staging.load(&branch)?;
            let result = self
                .prepare_commit(&branch, &snapshot, &options)
                .and_then(|prepared| self.finalize_commit(prepared));
            match result {
                Ok(id) => return Ok(id),
                Err(e) if e.is_retryable() && attempts <= max_retries => {
                    warn!(
                        branch = %branch,
                        attempt = attempts,
                        error = %e,
                        "commit lost race, retrying"
                    );
                    thread::sleep(backoff(attempts));
                }
                Err(SdkError::NoChanges(_)) if attempts > 1 => {
                    let Some(head) = self.refs.read_branch(&branch)? else {
                        return Err(SdkError::NoChanges(branch));
                    };
                    self.staging.update(&branch, &mut |area| {
                        area.clear_committed(&snapshot);
                        Ok(())
                    })?;
                    debug!(branch = %branch, hash = %head.short_hex(), "staged entries already committed");
                    return Ok(head);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Build and store the tree for `staged` on top of `branch`'s head.
    ///
    /// Takes no lock. The result records the head it was built on, and
    /// [`finalize_commit`](Self::finalize_commit) refuses it if the head moved.
    pub fn prepare_commit(
        &self,
        branch: &str,
        staged: &StagingArea,
        options: &CommitOptions,
    ) -> SdkResult<PreparedCommit> {
        let parent = self.refs.read_branch(branch)?;
        if parent.is_none() && self.current_branch()? != branch {
            return Err(SdkError::NotFound(format!("branch {branch}")));
        }
        if staged.is_empty() && !options.allow_empty {
            return Err(SdkError::NoChanges(branch.to_string()));
        }

        let base = match &parent {
            Some(head) => self.tree_at(head)?,
            None => Tree::new(),
        };
        let tree = staged.apply_to(&base);
        let changed_paths = tree.changed_paths(&base);
        if changed_paths.is_empty() && !options.allow_empty {
            return Err(SdkError::NoChanges(branch.to_string()));
        }
        let tree_hash = tree.write_to(self.objects.as_ref())?;

        let timestamp_ms = options
            .timestamp_ms
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        let record = CommitRecord::new(
            parent,
            tree_hash,
            options.author.clone(),
            options.message.clone(),
            timestamp_ms,
        );
        Ok(PreparedCommit {
            branch: branch.to_string(),
            record,
            staged: staged.clone(),
            changed_paths,
        })
    }

    /// Append the commit and advance its branch.
    pub fn finalize_commit(&self, prepared: PreparedCommit) -> SdkResult<ObjectId> {
        let lock = self.branch_lock(&prepared.branch);
        let _guard = lock.lock().expect("branch lock poisoned");

        let id = prepared.commit_hash();
        let expected = prepared.parent();
        let actual = self.refs.read_branch(&prepared.branch)?;
        if actual != expected {
            warn!(
                branch = %prepared.branch,
                expected = ?expected.map(|h| h.short_hex()),
                actual = ?actual.map(|h| h.short_hex()),
                "branch moved before commit"
            );
            return Err(SdkError::ConcurrentModification {
                branch: prepared.branch,
                expected,
                actual,
            });
        }

        self.commits.put(&prepared.record)?;
        self.refs.compare_and_swap(&prepared.branch, expected, id)?;

        if !prepared.staged.is_empty() {
            let committed = &prepared.staged;
            let cleared = self.staging.update(&prepared.branch, &mut |area| {
                area.clear_committed(committed);
                Ok(())
            });
            if let Err(e) = cleared {
                warn!(branch = %prepared.branch, error = %e, "committed entries are still staged");
            }
        }
        info!(
            branch = %prepared.branch,
            hash = %id.short_hex(),
            paths = prepared.changed_paths.len(),
            "committed"
        );
        Ok(id)
    }

    // ---- Branches ----

    pub fn current_branch(&self) -> SdkResult<String> {
        self.refs
            .head()?
            .ok_or_else(|| SdkError::NotInitialized(self.root.display().to_string()))
    }

    /// Tip of the active branch, `None` while it is unborn.
    pub fn head_commit(&self) -> SdkResult<Option<ObjectId>> {
        self.read_branch(&self.current_branch()?)
    }

    /// Create `name` at `from`, or at the active branch's tip.
    pub fn create_branch(&self, name: &str, from: Option<ObjectId>) -> SdkResult<ObjectId> {
        let target = match from {
            Some(id) => {
                if !self.commits.contains(&id)? {
                    return Err(SdkError::NotFound(format!("commit {id}")));
                }
                id
            }
            None => {
                let current = self.current_branch()?;
                self.refs.read_branch(&current)?.ok_or_else(|| {
                    SdkError::InvalidInput(format!("branch {current} has no commits yet"))
                })?
            }
        };
        self.refs.create_branch(name, target)?;
        info!(branch = name, hash = %target.short_hex(), "branch created");
        Ok(target)
    }

    pub fn delete_branch(&self, name: &str) -> SdkResult<()> {
        let _head = self.head_lock();
        if self.current_branch()? == name {
            return Err(SdkError::InvalidInput(format!(
                "cannot delete the active branch {name}"
            )));
        }
        if !self.refs.delete_branch(name)? {
            return Err(SdkError::NotFound(format!("branch {name}")));
        }
        self.staging.discard(name)?;
        info!(branch = name, "branch deleted");
        Ok(())
    }

    /// Make `name` the active branch.
    ///
    /// Pending changes on the current branch block the switch unless
    /// `discard` is set, in which case they are dropped.
    pub fn checkout(&self, name: &str, discard: bool) -> SdkResult<()> {
        let _head = self.head_lock();
        let current = self.current_branch()?;
        if current == name {
            return Ok(());
        }
        if self.refs.read_branch(name)?.is_none() {
            return Err(SdkError::NotFound(format!("branch {name}")));
        }
        let pending = self.staging.load(&current)?.len();
        if pending > 0 {
            if !discard {
                return Err(SdkError::UncommittedChanges {
                    branch: current,
                    staged: pending,
                });
            }
            self.staging.discard(&current)?;
            warn!(branch = %current, discarded = pending, "discarded staged changes");
        }
        self.refs.set_head(name)?;
        info!(from = %current, to = name, "checked out");
        Ok(())
    }

    /// All branches, sorted by name. An unborn active branch is included
    /// with no head.
    pub fn list_branches(&self) -> SdkResult<Vec<BranchInfo>> {
        let current = self.current_branch()?;
        let mut branches: Vec<BranchInfo> = self
            .refs
            .list_branches()?
            .into_iter()
            .map(|(name, head)| BranchInfo {
                is_current: name == current,
                name,
                head: Some(head),
            })
            .collect();
        if !branches.iter().any(|b| b.is_current) {
            branches.push(BranchInfo {
                name: current,
                head: None,
                is_current: true,
            });
            branches.sort_by(|a, b| a.name.cmp(&b.name));
        }
        Ok(branches)
    }

    // ---- Queries ----

    /// Newest-first history of `branch` (default: the active branch).
    pub fn get_history(&self, branch: Option<&str>, limit: Option<usize>) -> SdkResult<History> {
        let current = self.current_branch()?;
        let branch = branch.unwrap_or(&current);
        let tip = self.refs.read_branch(branch)?;
        if tip.is_none() && branch != current {
            return Err(SdkError::NotFound(format!("branch {branch}")));
        }
        Ok(History::new(
            Arc::clone(&self.commits),
            Arc::clone(&self.objects),
            tip,
            limit,
        ))
    }

    pub fn get_commit(&self, id: &ObjectId) -> SdkResult<CommitRecord> {
        Ok(self.commits.get(id)?)
    }

    /// Every file at `commit`, by path.
    pub fn get_version(&self, commit: &ObjectId) -> SdkResult<BTreeMap<String, Vec<u8>>> {
        let tree = self.tree_at(commit)?;
        tree.iter()
            .map(|(path, blob)| -> SdkResult<(String, Vec<u8>)> {
                Ok((path.clone(), self.objects.get(blob)?))
            })
            .collect()
    }

    /// One file at `commit`.
    pub fn read_file(&self, commit: &ObjectId, path: &str) -> SdkResult<Vec<u8>> {
        let tree = self.tree_at(commit)?;
        let blob = tree
            .get(path)
            .ok_or_else(|| SdkError::NotFound(format!("path {path} in {}", commit.short_hex())))?;
        Ok(self.objects.get(blob)?)
    }

    /// Resolve a branch name or a full commit hash.
    pub fn resolve(&self, rev: &str) -> SdkResult<ObjectId> {
        if rev.len() == ObjectId::HEX_LEN {
            if let Ok(id) = ObjectId::from_hex(rev) {
                if self.commits.contains(&id)? {
                    return Ok(id);
                }
            }
        }
        match self.refs.read_branch(rev) {
            Ok(Some(id)) => Ok(id),
            Ok(None) | Err(RefError::InvalidBranchName { .. }) => {
                Err(SdkError::NotFound(format!("revision {rev}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn status(&self) -> SdkResult<RepositoryStatus> {
        let branch = self.current_branch()?;
        let staged_count = self.staging.load(&branch)?.len();
        let head_commit_hash = self.refs.read_branch(&branch)?;
        let history_length = match &head_commit_hash {
            Some(head) => hvcs_history::depth(self.commits.as_ref(), head)? + 1,
            None => 0,
        };
        Ok(RepositoryStatus {
            branches: self.list_branches()?,
            branch,
            staged_count,
            head_commit_hash,
            history_length,
        })
    }

    // ---- State ----

    pub fn save_state(&self, key: &str, value: &StateValue) -> SdkResult<()> {
        Ok(self.state.save_state(key, value)?)
    }

    pub fn load_state(&self, key: &str) -> SdkResult<StateValue> {
        Ok(self.state.load_state(key)?)
    }

    pub fn list_state_keys(&self, prefix: &str) -> SdkResult<Vec<String>> {
        Ok(self.state.list_state_keys(prefix)?)
    }

    pub fn delete_state(&self, key: &str) -> SdkResult<bool> {
        Ok(self.state.delete_state(key)?)
    }

    /// Append feedback linked to an existing commit.
    pub fn record_feedback(&self, record: &FeedbackRecord) -> SdkResult<i64> {
        if !self.commits.contains(&record.commit_hash)? {
            return Err(SdkError::NotFound(format!("commit {}", record.commit_hash)));
        }
        let id = self.state.record_feedback(record)?;
        debug!(
            commit = %record.commit_hash.short_hex(),
            category = %record.category,
            severity = record.severity,
            "feedback recorded"
        );
        Ok(id)
    }

    pub fn feedback_for_commit(
        &self,
        commit: &ObjectId,
        category: Option<&str>,
    ) -> SdkResult<Vec<FeedbackRecord>> {
        Ok(self.state.feedback_for_commit(commit, category)?)
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
