//! Commit graph for Hybrid VCS.
//!
//! A commit links a tree to at most one parent commit plus authorship
//! metadata. Its identity is a deterministic hash of exactly those fields,
//! so commits are immutable and a parent chain can never contain a cycle.
//!
//! - [`CommitRecord`] -- one commit and its hash derivation
//! - [`CommitStore`] -- persistence trait, with [`FsCommitStore`] and
//!   [`InMemoryCommitStore`] backends
//! - [`Ancestors`] -- lazy newest-first walk of a parent chain

pub mod error;
pub mod fs;
pub mod memory;
pub mod record;
pub mod traits;
pub mod walk;

pub use error::{HistoryError, HistoryResult};
pub use fs::FsCommitStore;
pub use memory::InMemoryCommitStore;
pub use record::CommitRecord;
pub use traits::CommitStore;
pub use walk::{depth, Ancestors};
