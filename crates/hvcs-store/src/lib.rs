//! Content-addressed blob storage for Hybrid VCS.
//!
//! Every payload is identified by the SHA-256 of its uncompressed bytes.
//! Identical content always lands on the same identifier, so a second `put`
//! of the same bytes writes nothing.
//!
//! # Object Types
//!
//! - raw blobs: opaque byte payloads
//! - [`Tree`]: a sorted `path -> blob id` map, serialized as canonical JSON
//!   and stored as a blob itself
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FsObjectStore`] -- bucketed `objects/<hh>/<hash>.blob` files, zstd
//!   compressed through [`hvcs_compress::CompressionEngine`]
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written.
//! 2. Writes are atomic: temp file in the bucket, then a no-clobber rename.
//! 3. `put` needs no lock. Racing writers of identical content converge.
//! 4. Reads always re-hash. A mismatch is an error, never returned data.

pub mod blob;
pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod stats;
pub mod traits;

pub use blob::{BlobHeader, BLOB_MAGIC, FLAG_COMPRESSED, HEADER_LEN};
pub use error::{StoreError, StoreResult};
pub use fs::{FsObjectStore, StoreConfig};
pub use memory::InMemoryObjectStore;
pub use object::Tree;
pub use stats::StoreStats;
pub use traits::ObjectStore;
