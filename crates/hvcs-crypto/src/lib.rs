//! Hashing primitives for Hybrid VCS.
//!
//! Blobs and trees are addressed by the plain SHA-256 of their bytes. Commit
//! identities use a domain-separated, length-prefixed field encoding so that
//! no two distinct field tuples hash the same input.
//!
//! All crypto operations wrap established libraries.

pub mod hasher;

pub use hasher::ContentHasher;
