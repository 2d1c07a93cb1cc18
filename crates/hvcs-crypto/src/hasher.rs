use hvcs_types::ObjectId;
use sha2::{Digest, Sha256};

/// Domain-separated SHA-256 content hasher.
///
/// Each hasher carries a domain tag (e.g. `"hvcs-commit-v1"`) that is fed to
/// the digest before any field. Fields are framed with their length as a
/// little-endian `u64`, so `("ab", "c")` and `("a", "bc")` never collide.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for commit identities.
    pub const COMMIT: Self = Self {
        domain: "hvcs-commit-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash an ordered list of fields under this hasher's domain.
    pub fn hash_fields(&self, fields: &[&[u8]]) -> ObjectId {
        let mut hasher = Sha256::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for field in fields {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        ObjectId::from_hash(hasher.finalize().into())
    }

    /// Plain SHA-256 without domain separation. This is the blob and tree address.
    pub fn raw_hash(data: &[u8]) -> ObjectId {
        ObjectId::from_bytes(data)
    }

    /// Verify that `data` is the content behind `expected`.
    pub fn verify_raw(data: &[u8], expected: &ObjectId) -> bool {
        Self::raw_hash(data) == *expected
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}
