//! Filesystem ref store.
//!
//! ```text
//! <root>/HEAD                  "ref: refs/heads/<branch>\n"
//! <root>/refs/heads/<branch>   "<64 hex>\n"
//! ```
//!
//! Every mutation holds `<file>.lock` (see [`LockFile`]) while it re-reads
//! the current value and renames the new one into place, so stores opened on
//! the same directory from different handles or processes never lose an
//! update.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use hvcs_types::ObjectId;
use tracing::debug;

use crate::error::{RefError, Result};
use crate::lock::{LockFile, DEFAULT_LOCK_TIMEOUT};
use crate::names::validate_branch_name;
use crate::traits::RefStore;

const HEAD_PREFIX: &str = "ref: refs/heads/";

#[derive(Debug)]
pub struct FsRefStore {
    root: PathBuf,
    lock_timeout: Duration,
}

impl FsRefStore {
    /// Open a ref store rooted at the repository directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("refs").join("heads"))?;
        Ok(Self {
            root,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        })
    }

    /// How long a mutation waits for another writer's lock file.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn heads_dir(&self) -> PathBuf {
        self.root.join("refs").join("heads")
    }

    fn branch_path(&self, name: &str) -> PathBuf {
        self.heads_dir().join(name)
    }

    fn lock_branch(&self, name: &str) -> Result<LockFile> {
        LockFile::acquire(&self.branch_path(name), self.lock_timeout)
    }

    fn read_tip(&self, name: &str) -> Result<Option<ObjectId>> {
        let text = match fs::read_to_string(self.branch_path(name)) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        ObjectId::from_hex(text.trim())
            .map(Some)
            .map_err(|e| RefError::Malformed {
                name: format!("refs/heads/{name}"),
                reason: e.to_string(),
            })
    }

    fn collect_branches(&self, dir: &Path, prefix: &str, out: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            let name = if prefix.is_empty() {
                file_name.to_string()
            } else {
                format!("{prefix}/{file_name}")
            };
            if entry.file_type()?.is_dir() {
                self.collect_branches(&entry.path(), &name, out)?;
            } else if validate_branch_name(&name).is_ok() {
                // Skips held `.lock` files.
                out.push(name);
            }
        }
        Ok(())
    }

    fn prune_empty_parents(&self, path: &Path) {
        let heads = self.heads_dir();
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == heads || fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

fn tip_line(target: &ObjectId) -> String {
    format!("{}\n", target.to_hex())
}

impl RefStore for FsRefStore {
    fn read_branch(&self, name: &str) -> Result<Option<ObjectId>> {
        validate_branch_name(name)?;
        self.read_tip(name)
    }

    fn create_branch(&self, name: &str, target: ObjectId) -> Result<()> {
        validate_branch_name(name)?;
        let lock = self.lock_branch(name)?;
        if self.read_tip(name)?.is_some() {
            return Err(RefError::AlreadyExists {
                name: name.to_string(),
            });
        }
        lock.commit(tip_line(&target).as_bytes())?;
        debug!(branch = name, target = %target.short_hex(), "branch created");
        Ok(())
    }

    fn compare_and_swap(&self, name: &str, expected: Option<ObjectId>, new: ObjectId) -> Result<()> {
        validate_branch_name(name)?;
        let lock = self.lock_branch(name)?;
        let actual = self.read_tip(name)?;
        if actual != expected {
            return Err(RefError::Conflict {
                name: name.to_string(),
                expected,
                actual,
            });
        }
        lock.commit(tip_line(&new).as_bytes())?;
        debug!(branch = name, target = %new.short_hex(), "branch advanced");
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<bool> {
        validate_branch_name(name)?;
        let path = self.branch_path(name);
        let existed = self.lock_branch(name)?.remove_target()?;
        if existed {
            self.prune_empty_parents(&path);
            debug!(branch = name, "branch deleted");
        }
        Ok(existed)
    }

    fn list_branches(&self) -> Result<Vec<(String, ObjectId)>> {
        let mut names = Vec::new();
        self.collect_branches(&self.heads_dir(), "", &mut names)?;
        names.sort();
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            if let Some(tip) = self.read_tip(&name)? {
                out.push((name, tip));
            }
        }
        Ok(out)
    }

    fn head(&self) -> Result<Option<String>> {
        let text = match fs::read_to_string(self.root.join("HEAD")) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let branch = text
            .trim_end()
            .strip_prefix(HEAD_PREFIX)
            .ok_or_else(|| RefError::Malformed {
                name: "HEAD".into(),
                reason: format!("expected '{HEAD_PREFIX}<branch>'"),
            })?;
        validate_branch_name(branch)?;
        Ok(Some(branch.to_string()))
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        let lock = LockFile::acquire(&self.root.join("HEAD"), self.lock_timeout)?;
        lock.commit(format!("{HEAD_PREFIX}{branch}\n").as_bytes())
    }
}
