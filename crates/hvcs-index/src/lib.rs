//! Staging area for Hybrid VCS.
//!
//! Holds pending `path -> blob` changes between `stage` and `commit`. The
//! staging area never touches storage: blobs are written by the caller
//! before a path is staged, and [`StagingArea::apply_to`] overlays the
//! pending changes onto a parent [`hvcs_store::Tree`].
//!
//! # Key Types
//!
//! - [`StagingArea`] -- BTreeMap-backed set of pending changes
//! - [`StagedChange`] -- upsert of a blob or removal of a path

pub mod error;
pub mod staging;

pub use error::{IndexError, IndexResult};
pub use staging::{validate_path, StagedChange, StagingArea};
