//! Git-style lock files.
//!
//! Updating `<path>` means creating `<path>.lock` exclusively, writing the new
//! contents into it, and renaming it over `<path>`. Whoever holds the lock file
//! owns the update, across threads and processes alike. A guard dropped
//! without [`LockFile::commit`] removes the lock and leaves `<path>` untouched.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{RefError, Result};

/// How long [`LockFile::acquire`] waits for another holder by default.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const POLL_INTERVAL: Duration = Duration::from_millis(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Held lock on `<target>.lock`.
#[derive(Debug)]
pub struct LockFile {
    target: PathBuf,
    lock_path: PathBuf,
    file: Option<File>,
}

impl LockFile {
    /// Take the lock for `target`, polling until `timeout` if it is held.
    ///
    /// A lock left behind by a crashed writer is never broken automatically:
    /// after the timeout the caller gets [`RefError::Locked`] naming the file
    /// to remove.
    pub fn acquire(target: &Path, timeout: Duration) -> Result<Self> {
        let lock_path = lock_path_for(target);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let started = Instant::now();
        let mut interval = POLL_INTERVAL;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
                Ok(file) => {
                    return Ok(Self {
                        target: target.to_path_buf(),
                        lock_path,
                        file: Some(file),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        warn!(lock = %lock_path.display(), "gave up waiting for lock");
                        return Err(RefError::Locked {
                            path: lock_path.display().to_string(),
                        });
                    }
                    thread::sleep(interval);
                    interval = (interval * 2).min(MAX_POLL_INTERVAL);
                }
                // The directory was pruned between create_dir_all and open.
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    if let Some(parent) = lock_path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Replace the target with `contents` and release the lock.
    pub fn commit(mut self, contents: &[u8]) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let written =
            write_synced(file, contents).and_then(|()| fs::rename(&self.lock_path, &self.target));
        if let Err(e) = written {
            let _ = fs::remove_file(&self.lock_path);
            return Err(e.into());
        }
        debug!(target = %self.target.display(), "lock committed");
        Ok(())
    }

    /// Delete the target and release the lock. Returns whether it existed.
    pub fn remove_target(self) -> Result<bool> {
        match fs::remove_file(&self.target) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            drop(file);
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

fn write_synced(mut file: File, contents: &[u8]) -> io::Result<()> {
    file.write_all(contents)?;
    file.sync_all()
}

/// `<target>.lock`, next to the target.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};

    #[test]
    fn commit_replaces_target_and_releases() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ref");
        fs::write(&target, "old").unwrap();

        let lock = LockFile::acquire(&target, DEFAULT_LOCK_TIMEOUT).unwrap();
        assert!(lock_path_for(&target).exists());
        lock.commit(b"new").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
        assert!(!lock_path_for(&target).exists());
    }

    #[test]
    fn dropped_lock_leaves_target_alone() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/ref");
        {
            let _lock = LockFile::acquire(&target, DEFAULT_LOCK_TIMEOUT).unwrap();
        }
        assert!(!target.exists());
        assert!(!lock_path_for(&target).exists());
    }

    #[test]
    fn held_lock_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ref");
        let _held = LockFile::acquire(&target, DEFAULT_LOCK_TIMEOUT).unwrap();
        let err = LockFile::acquire(&target, Duration::from_millis(30)).unwrap_err();
        assert!(matches!(err, RefError::Locked { .. }), "{err:?}");
    }

    #[test]
    fn remove_target_reports_existence() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ref");
        fs::write(&target, "x").unwrap();
        assert!(LockFile::acquire(&target, DEFAULT_LOCK_TIMEOUT).unwrap().remove_target().unwrap());
        assert!(!LockFile::acquire(&target, DEFAULT_LOCK_TIMEOUT).unwrap().remove_target().unwrap());
        assert!(!lock_path_for(&target).exists());
    }

    #[test]
    fn contending_writers_take_turns() {
        let dir = tempfile::tempdir().unwrap();
        let target = Arc::new(dir.path().join("counter"));
        fs::write(target.as_ref(), "0").unwrap();
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let target = Arc::clone(&target);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..25 {
                        let lock = LockFile::acquire(&target, DEFAULT_LOCK_TIMEOUT).unwrap();
                        let n: u32 = fs::read_to_string(lock.target()).unwrap().parse().unwrap();
                        lock.commit((n + 1).to_string().as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(fs::read_to_string(target.as_ref()).unwrap(), "100");
    }
}
