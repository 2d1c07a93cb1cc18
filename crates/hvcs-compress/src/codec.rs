//! Stateless zstd codec.

use std::io::{Read, Write};
use std::ops::RangeInclusive;

use crate::error::{CompressionError, CompressionResult};

/// Default zstd level (ratio vs. CPU trade-off).
pub const DEFAULT_LEVEL: i32 = 6;

/// Payloads larger than this are fed to the encoder one chunk at a time.
pub const CHUNK_SIZE: usize = 128 * 1024;

/// Levels accepted by [`compress`].
pub fn level_range() -> RangeInclusive<i32> {
    zstd::compression_level_range()
}

/// Reject levels zstd does not support.
pub fn validate_level(level: i32) -> CompressionResult<()> {
    let range = level_range();
    if !range.contains(&level) {
        return Err(CompressionError::InvalidLevel {
            level,
            min: *range.start(),
            max: *range.end(),
        });
    }
    Ok(())
}

/// Compress `data` into a single zstd frame.
///
/// Every byte string is accepted, including the empty one.
pub fn compress(data: &[u8], level: i32) -> CompressionResult<Vec<u8>> {
    validate_level(level)?;
    if data.len() > CHUNK_SIZE {
        return compress_chunked(data, level);
    }
    zstd::bulk::compress(data, level).map_err(|e| CompressionError::CompressionFailed(e.to_string()))
}

/// Streaming compression, writing `CHUNK_SIZE` slices into the encoder.
pub fn compress_chunked(data: &[u8], level: i32) -> CompressionResult<Vec<u8>> {
    validate_level(level)?;
    let mut encoder = zstd::stream::write::Encoder::new(Vec::with_capacity(data.len() / 2), level)
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
    for chunk in data.chunks(CHUNK_SIZE) {
        encoder
            .write_all(chunk)
            .map_err(|e| CompressionError::CompressionFailed(e.to_string()))?;
    }
    encoder
        .finish()
        .map_err(|e| CompressionError::CompressionFailed(e.to_string()))
}

/// Decompress a zstd frame of unknown output size.
pub fn decompress(data: &[u8]) -> CompressionResult<Vec<u8>> {
    zstd::stream::decode_all(data).map_err(|e| CompressionError::DecompressionFailed(e.to_string()))
}

/// Decompress a frame whose output must be exactly `expected_len` bytes.
///
/// Reading stops one byte past `expected_len`, so a corrupt or hostile frame
/// cannot expand without bound.
pub fn decompress_exact(data: &[u8], expected_len: u64) -> CompressionResult<Vec<u8>> {
    let mut decoder = zstd::stream::read::Decoder::new(data)
        .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
    let capacity = usize::try_from(expected_len).unwrap_or(usize::MAX).min(64 * 1024 * 1024);
    let mut out = Vec::with_capacity(capacity);
    Read::by_ref(&mut decoder)
        .take(expected_len.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| CompressionError::DecompressionFailed(e.to_string()))?;
    if out.len() as u64 != expected_len {
        return Err(CompressionError::LengthMismatch {
            expected: expected_len,
            actual: out.len() as u64,
        });
    }
    Ok(out)
}
