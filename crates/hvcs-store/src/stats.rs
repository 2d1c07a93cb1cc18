use std::sync::atomic::{AtomicU64, Ordering};

use hvcs_compress::CompressionStats;

/// Snapshot of object store write counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// New blob files created.
    pub blobs_written: u64,
    /// Bytes written to storage, headers included.
    pub bytes_written: u64,
    /// Uncompressed size of the blobs written.
    pub original_bytes: u64,
    /// `put` calls that found the blob already present.
    pub dedup_hits: u64,
}

impl StoreStats {
    /// Compression achieved across everything written so far.
    pub fn compression(&self) -> CompressionStats {
        CompressionStats::new(self.original_bytes, self.bytes_written)
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    blobs_written: AtomicU64,
    bytes_written: AtomicU64,
    original_bytes: AtomicU64,
    dedup_hits: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn record_write(&self, original: u64, stored: u64) {
        self.blobs_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(stored, Ordering::Relaxed);
        self.original_bytes.fetch_add(original, Ordering::Relaxed);
    }

    pub(crate) fn record_dedup(&self) {
        self.dedup_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StoreStats {
        StoreStats {
            blobs_written: self.blobs_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            original_bytes: self.original_bytes.load(Ordering::Relaxed),
            dedup_hits: self.dedup_hits.load(Ordering::Relaxed),
        }
    }
}
