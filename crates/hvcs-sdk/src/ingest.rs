//! Idempotent ingestion for external producers.
//!
//! A producer (crawler, browser extension, HTTP handler) submits one file at
//! a time. Content identical to what the branch head already holds for that
//! path commits nothing. Each request stages into its own [`StagingArea`], so
//! concurrent producers never pick up each other's pending edits, and a lost
//! commit race is retried against the new head.

use std::thread;
use std::time::Duration;

use hvcs_crypto::ContentHasher;
use hvcs_index::{validate_path, StagingArea};
use hvcs_types::ObjectId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::commit::CommitOptions;
use crate::error::{SdkError, SdkResult};
use crate::repository::Repository;

const RETRY_BASE: Duration = Duration::from_millis(2);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub path: String,
    pub content: Vec<u8>,
    pub author: String,
    pub message: String,
    /// Free-form producer label, logged with every outcome.
    pub source_identity: String,
    /// Target branch. Defaults to the active branch.
    pub branch: Option<String>,
}

impl IngestRequest {
    pub fn new(
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
        author: impl Into<String>,
        message: impl Into<String>,
        source_identity: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            author: author.into(),
            message: message.into(),
            source_identity: source_identity.into(),
            branch: None,
        }
    }

    pub fn on_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    /// The new commit, or the existing head when nothing changed.
    pub commit_hash: ObjectId,
    pub created: bool,
    /// Commit attempts made, 0 when the content was unchanged on first look.
    pub attempts: u32,
}

impl Repository {
    /// Version `request.content` at `request.path` if it differs from the
    /// branch head.
    ///
    /// Calling this twice with the same content leaves one commit and returns
    /// its hash both times.
    pub fn ingest(&self, request: IngestRequest) -> SdkResult<IngestReceipt> {
        validate_path(&request.path)?;
        let branch = match &request.branch {
            Some(b) => b.clone(),
            None => self.current_branch()?,
        };
        let content_hash = ContentHasher::raw_hash(&request.content);
        let size = request.content.len() as u64;
        let max_retries = self.config().max_commit_retries;
        let mut stored = false;
        let mut attempts = 0u32;

        loop {
            let head = self.read_branch(&branch)?;
            if let Some(head) = head {
                if self.tree_at(&head)?.get(&request.path) == Some(&content_hash) {
                    info!(
                        source = %request.source_identity,
                        branch = %branch,
                        path = %request.path,
                        hash = %head.short_hex(),
                        "ingest unchanged"
                    );
                    return Ok(IngestReceipt {
                        commit_hash: head,
                        created: false,
                        attempts,
                    });
                }
            }

            // Compression runs before any branch lock is taken.
            if !stored {
                self.objects().put(&request.content)?;
                stored = true;
            }

            let mut staged = StagingArea::new();
            staged.stage(&request.path, content_hash, size)?;
            let options = CommitOptions::new(request.message.clone(), request.author.clone());
            attempts += 1;

            let result = self
                .prepare_commit(&branch, &staged, &options)
                .and_then(|prepared| self.finalize_commit(prepared));
            match result {
                Ok(commit_hash) => {
                    info!(
                        source = %request.source_identity,
                        branch = %branch,
                        path = %request.path,
                        hash = %commit_hash.short_hex(),
                        attempts,
                        "ingest committed"
                    );
                    return Ok(IngestReceipt {
                        commit_hash,
                        created: true,
                        attempts,
                    });
                }
                Err(e) if e.is_retryable() && attempts <= max_retries => {
                    warn!(
                        source = %request.source_identity,
                        branch = %branch,
                        attempt = attempts,
                        error = %e,
                        "ingest lost commit race, retrying"
                    );
                    thread::sleep(backoff(attempts));
                }
                // The head moved to a tree that already holds this content.
                Err(SdkError::NoChanges(_)) => {
                    debug!(source = %request.source_identity, "head caught up, rechecking");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Delay before commit attempt `attempt + 1`: doubling from 2ms, capped at
/// 512ms, plus up to half again in jitter.
pub(crate) fn backoff(attempt: u32) -> Duration {
    let base = RETRY_BASE * 2u32.saturating_pow(attempt.min(8));
    let jitter = rand::thread_rng().gen_range(0..=base.as_millis() as u64 / 2);
    base + Duration::from_millis(jitter)
}
