use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use hvcs_types::ObjectId;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{HistoryError, HistoryResult};
use crate::record::CommitRecord;
use crate::traits::CommitStore;

/// Commit records as JSON files: `<root>/<hh>/<hash>.json`.
#[derive(Debug)]
pub struct FsCommitStore {
    root: PathBuf,
    bucket_prefix_len: usize,
}

impl FsCommitStore {
    pub fn open(root: impl Into<PathBuf>, bucket_prefix_len: usize) -> HistoryResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            bucket_prefix_len: bucket_prefix_len.clamp(1, ObjectId::HEX_LEN),
        })
    }

    pub fn record_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.root
            .join(&hex[..self.bucket_prefix_len])
            .join(format!("{hex}.json"))
    }
}

impl CommitStore for FsCommitStore {
    fn put(&self, record: &CommitRecord) -> HistoryResult<()> {
        let path = self.record_path(&record.commit_hash);
        if path.exists() {
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(record)
            .map_err(|e| HistoryError::Serialization(e.to_string()))?;
        let bucket = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(bucket)?;
        let mut tmp = NamedTempFile::new_in(bucket)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        match tmp.persist_noclobber(&path) {
            Ok(_) => {}
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.error.into()),
        }
        debug!(commit = %record.commit_hash.short_hex(), "commit record written");
        Ok(())
    }

    fn get(&self, id: &ObjectId) -> HistoryResult<CommitRecord> {
        let bytes = match fs::read(self.record_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(HistoryError::NotFound(*id)),
            Err(e) => return Err(e.into()),
        };
        let record: CommitRecord = serde_json::from_slice(&bytes)
            .map_err(|e| HistoryError::Serialization(format!("commit {id}: {e}")))?;
        if record.commit_hash != *id {
            warn!(commit = %id.short_hex(), "commit file holds a different commit");
            return Err(HistoryError::Integrity {
                id: *id,
                computed: record.commit_hash,
            });
        }
        record.verify()?;
        Ok(record)
    }

    fn contains(&self, id: &ObjectId) -> HistoryResult<bool> {
        Ok(self.record_path(id).is_file())
    }
}
