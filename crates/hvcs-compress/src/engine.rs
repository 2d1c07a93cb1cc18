use tracing::debug;

use crate::codec;
use crate::error::{CompressionError, CompressionResult};
use crate::pool::WorkerPool;

/// Tuning knobs for a [`CompressionEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// zstd level used by [`CompressionEngine::compress_default`].
    pub level: i32,
    /// Number of pool workers (`MAX_WORKERS`).
    pub max_workers: usize,
    /// Payloads at or above this size are compressed on the pool.
    pub streaming_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            level: codec::DEFAULT_LEVEL,
            max_workers: 4,
            streaming_threshold: 1024 * 1024,
        }
    }
}

/// zstd compression with a bounded worker pool for large and batched work.
#[derive(Debug)]
pub struct CompressionEngine {
    config: EngineConfig,
    pool: WorkerPool,
}

impl CompressionEngine {
    /// Create an engine, validating the configured level and worker count.
    pub fn new(config: EngineConfig) -> CompressionResult<Self> {
        codec::validate_level(config.level)?;
        let pool = WorkerPool::new(config.max_workers)?;
        Ok(Self { config, pool })
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Compress at the configured level.
    ///
    /// Below the streaming threshold this runs on the caller's thread.
    /// Larger payloads are copied onto the pool and compressed in chunks.
    pub fn compress_default(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        self.compress(data, self.config.level)
    }

    /// Compress at an explicit level.
    pub fn compress(&self, data: &[u8], level: i32) -> CompressionResult<Vec<u8>> {
        if data.len() < self.config.streaming_threshold {
            return codec::compress(data, level);
        }
        debug!(bytes = data.len(), level, "compressing on worker pool");
        let owned = data.to_vec();
        self.pool
            .execute(move || codec::compress_chunked(&owned, level))?
            .wait()?
    }

    /// Compress many independent payloads across the pool, in input order.
    pub fn compress_batch(
        &self,
        items: Vec<Vec<u8>>,
        level: i32,
    ) -> Vec<CompressionResult<Vec<u8>>> {
        if codec::validate_level(level).is_err() {
            let range = codec::level_range();
            return items
                .iter()
                .map(|_| {
                    Err(CompressionError::InvalidLevel {
                        level,
                        min: *range.start(),
                        max: *range.end(),
                    })
                })
                .collect();
        }
        debug!(count = items.len(), level, "batch compression");
        self.pool
            .map(items, move |data| codec::compress(&data, level))
            .into_iter()
            .map(|r| r.and_then(|inner| inner))
            .collect()
    }

    /// Decompress a zstd frame.
    pub fn decompress(&self, data: &[u8]) -> CompressionResult<Vec<u8>> {
        codec::decompress(data)
    }

    /// Decompress a frame whose output length is known in advance.
    pub fn decompress_exact(&self, data: &[u8], expected_len: u64) -> CompressionResult<Vec<u8>> {
        codec::decompress_exact(data, expected_len)
    }
}
