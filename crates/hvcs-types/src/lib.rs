//! Foundation types for Hybrid VCS.
//!
//! Every other `hvcs-*` crate depends on `hvcs-types` for the identifier that
//! names blobs, trees, and commits.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (SHA-256 hash)
//! - [`TypeError`]: Parse failures for identifiers

pub mod error;
pub mod object;

pub use error::TypeError;
pub use object::ObjectId;
