use chrono::{DateTime, TimeZone, Utc};
use hvcs_crypto::ContentHasher;
use hvcs_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

/// An immutable commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub commit_hash: ObjectId,
    /// `None` for a root commit.
    pub parent_hash: Option<ObjectId>,
    pub tree_hash: ObjectId,
    pub author: String,
    pub message: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

impl CommitRecord {
    /// Build a record, deriving its hash from the other fields.
    pub fn new(
        parent_hash: Option<ObjectId>,
        tree_hash: ObjectId,
        author: impl Into<String>,
        message: impl Into<String>,
        timestamp_ms: i64,
    ) -> Self {
        let author = author.into();
        let message = message.into();
        let commit_hash = Self::compute_hash(parent_hash.as_ref(), &tree_hash, &message, &author, timestamp_ms);
        Self {
            commit_hash,
            parent_hash,
            tree_hash,
            author,
            message,
            timestamp_ms,
        }
    }

    /// `hash(parent ∥ tree ∥ message ∥ author ∥ timestamp)`.
    ///
    /// Each field is length-prefixed, and a root commit contributes an empty
    /// parent field.
    pub fn compute_hash(
        parent_hash: Option<&ObjectId>,
        tree_hash: &ObjectId,
        message: &str,
        author: &str,
        timestamp_ms: i64,
    ) -> ObjectId {
        let parent: &[u8] = match parent_hash {
            Some(p) => p.as_bytes(),
            None => &[],
        };
        let timestamp = timestamp_ms.to_string();
        ContentHasher::COMMIT.hash_fields(&[
            parent,
            tree_hash.as_bytes().as_slice(),
            message.as_bytes(),
            author.as_bytes(),
            timestamp.as_bytes(),
        ])
    }

    /// Recompute the hash and compare it to `commit_hash`.
    pub fn verify(&self) -> HistoryResult<()> {
        let computed = Self::compute_hash(
            self.parent_hash.as_ref(),
            &self.tree_hash,
            &self.message,
            &self.author,
            self.timestamp_ms,
        );
        if computed != self.commit_hash {
            return Err(HistoryError::Integrity {
                id: self.commit_hash,
                computed,
            });
        }
        Ok(())
    }

    pub fn is_root(&self) -> bool {
        self.parent_hash.is_none()
    }

    /// Commit time as a UTC datetime.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp_ms).single()
    }

    /// One-line `short_hash message` form used in logs.
    pub fn summary(&self) -> String {
        let first_line = self.message.lines().next().unwrap_or("");
        format!("{} {}", self.commit_hash.short_hex(), first_line)
    }
}
