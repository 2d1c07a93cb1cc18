//! High-level API for Hybrid VCS.
//!
//! [`Repository`] ties the object store, commit graph, refs, and state
//! database together. Producers that version content from outside call
//! [`Repository::ingest`].
//!
//! ```no_run
//! use hvcs_sdk::{IngestRequest, Repository};
//!
//! let repo = Repository::init("./hybrid_repo")?;
//! repo.stage("notes/today.md", b"# plan")?;
//! let commit = repo.commit("add plan", "alice")?;
//!
//! let receipt = repo.ingest(IngestRequest::new(
//!     "pages/index.html",
//!     b"<html></html>".to_vec(),
//!     "crawler",
//!     "crawl index",
//!     "crawler-01",
//! ))?;
//! assert!(receipt.created);
//! # let _ = commit;
//! # Ok::<(), hvcs_sdk::SdkError>(())
//! ```

pub mod commit;
pub mod config;
pub mod error;
pub mod ingest;
pub mod repository;
pub mod staging;

#[cfg(test)]
mod testing;

pub use commit::{CommitOptions, History, HistoryEntry, PreparedCommit, RepositoryStatus};
pub use config::{RepoConfig, CONFIG_FILE, DEFAULT_REPO_DIR, REPO_DIR_ENV};
pub use error::{SdkError, SdkResult};
pub use ingest::{IngestReceipt, IngestRequest};
pub use repository::Repository;
pub use staging::{FsStagingStore, InMemoryStagingStore, StagingStore};

pub use hvcs_history::CommitRecord;
pub use hvcs_index::{StagedChange, StagingArea};
pub use hvcs_refs::BranchInfo;
pub use hvcs_state::{FeedbackRecord, StateValue};
pub use hvcs_store::StoreStats;
pub use hvcs_types::ObjectId;
