//! Where each branch's pending changes live between calls.
//!
//! [`FsStagingStore`] keeps one JSON file per branch under `<repo>/staging/`,
//! so `stage` in one process and `commit` in the next see the same entries.
//! Every edit is a read-modify-write under the file's [`LockFile`].

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use hvcs_index::StagingArea;
use hvcs_refs::{validate_branch_name, LockFile, DEFAULT_LOCK_TIMEOUT};
use tracing::debug;

use crate::error::{SdkError, SdkResult};

/// Per-branch staging persistence.
pub trait StagingStore: Send + Sync {
    /// Pending changes of `branch`, empty if none were staged.
    fn load(&self, branch: &str) -> SdkResult<StagingArea>;

    /// Apply `edit` to `branch`'s area and persist the result.
    ///
    /// If `edit` fails nothing is written. Returns the updated area.
    fn update(
        &self,
        branch: &str,
        edit: &mut dyn FnMut(&mut StagingArea) -> SdkResult<()>,
    ) -> SdkResult<StagingArea>;

    /// Drop everything staged on `branch`. Returns how many entries went.
    fn discard(&self, branch: &str) -> SdkResult<usize>;
}

#[derive(Debug, Default)]
pub struct InMemoryStagingStore {
    areas: Mutex<HashMap<String, StagingArea>>,
}

impl InMemoryStagingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StagingStore for InMemoryStagingStore {
    fn load(&self, branch: &str) -> SdkResult<StagingArea> {
        let areas = self.areas.lock().expect("lock poisoned");
        Ok(areas.get(branch).cloned().unwrap_or_default())
    }

    fn update(
        &self,
        branch: &str,
        edit: &mut dyn FnMut(&mut StagingArea) -> SdkResult<()>,
    ) -> SdkResult<StagingArea> {
        let mut areas = self.areas.lock().expect("lock poisoned");
        let mut area = areas.get(branch).cloned().unwrap_or_default();
        edit(&mut area)?;
        if area.is_empty() {
            areas.remove(branch);
        } else {
            areas.insert(branch.to_string(), area.clone());
        }
        Ok(area)
    }

    fn discard(&self, branch: &str) -> SdkResult<usize> {
        let mut areas = self.areas.lock().expect("lock poisoned");
        Ok(areas.remove(branch).map_or(0, |area| area.len()))
    }
}

/// `<root>/<branch>.json`, one file per branch with pending changes.
#[derive(Debug)]
pub struct FsStagingStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl FsStagingStore {
    pub fn open(root: impl Into<PathBuf>) -> SdkResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    fn area_path(&self, branch: &str) -> SdkResult<PathBuf> {
        validate_branch_name(branch)?;
        Ok(self.root.join(format!("{branch}.json")))
    }
}

fn read_area(path: &Path) -> SdkResult<StagingArea> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StagingArea::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| SdkError::Serialization(format!("{}: {e}", path.display())))
}

impl StagingStore for FsStagingStore {
    fn load(&self, branch: &str) -> SdkResult<StagingArea> {
        read_area(&self.area_path(branch)?)
    }

    fn update(
        &self,
        branch: &str,
        edit: &mut dyn FnMut(&mut StagingArea) -> SdkResult<()>,
    ) -> SdkResult<StagingArea> {
        let path = self.area_path(branch)?;
        let lock = LockFile::acquire(&path, self.lock_timeout)?;
        let mut area = read_area(&path)?;
        edit(&mut area)?;
        if area.is_empty() {
            lock.remove_target()?;
        } else {
            let json = serde_json::to_vec_pretty(&area)
                .map_err(|e| SdkError::Serialization(e.to_string()))?;
            lock.commit(&json)?;
        }
        debug!(branch, entries = area.len(), "staging saved");
        Ok(area)
    }

    fn discard(&self, branch: &str) -> SdkResult<usize> {
        let path = self.area_path(branch)?;
        let lock = LockFile::acquire(&path, self.lock_timeout)?;
        let dropped = read_area(&path)?.len();
        lock.remove_target()?;
        Ok(dropped)
    }
}
