//! Branch management for Hybrid VCS.
//!
//! Branches are named, mutable pointers to commit hashes. HEAD names the
//! active branch. A branch with no commits yet ("unborn") has no ref file;
//! HEAD may still name it.
//!
//! Advancing a branch is a compare-and-swap: the caller states which commit
//! it expects the branch to point at, and the update fails with
//! [`RefError::Conflict`] if another writer got there first.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: [`BranchInfo`]
//! - [`traits`]: The [`RefStore`] trait defining the storage interface
//! - [`names`]: Branch name validation
//! - [`fs`]: [`FsRefStore`], `HEAD` plus `refs/heads/<name>` files
//! - [`lock`]: [`LockFile`], exclusive `<file>.lock` updates shared across processes
//! - [`memory`]: In-memory [`InMemoryRefStore`] for tests

pub mod error;
pub mod fs;
pub mod lock;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use fs::FsRefStore;
pub use lock::{LockFile, DEFAULT_LOCK_TIMEOUT};
pub use memory::InMemoryRefStore;
pub use names::validate_branch_name;
pub use traits::RefStore;
pub use types::BranchInfo;
