//! Compression engine for Hybrid VCS.
//!
//! Lossless zstd compression of opaque byte payloads. The engine never looks
//! inside the bytes it is given.
//!
//! # Architecture
//!
//! - [`codec`]: stateless `compress` / `decompress` functions over zstd frames.
//!   Payloads larger than [`codec::CHUNK_SIZE`] are fed through a streaming
//!   encoder one chunk at a time.
//! - [`WorkerPool`]: fixed-size thread pool with a bounded job queue.
//! - [`CompressionEngine`]: small payloads compress on the caller's thread;
//!   payloads at or above the streaming threshold, and batches, run on the pool.
//! - [`CompressionStats`]: ratio and savings reporting.

pub mod codec;
pub mod engine;
pub mod error;
pub mod pool;
pub mod stats;

pub use codec::{compress, decompress, decompress_exact, level_range, DEFAULT_LEVEL};
pub use engine::{CompressionEngine, EngineConfig};
pub use error::{CompressionError, CompressionResult};
pub use pool::{JobHandle, WorkerPool};
pub use stats::CompressionStats;
