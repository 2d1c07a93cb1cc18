use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("invalid compression level {level}: supported range is {min}..={max}")]
    InvalidLevel { level: i32, min: i32, max: i32 },

    #[error("compression failed: {0}")]
    CompressionFailed(String),

    #[error("decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("decompressed length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("worker pool must have at least one worker")]
    NoWorkers,

    #[error("worker pool is shut down")]
    PoolClosed,

    #[error("compression worker panicked")]
    WorkerPanicked,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CompressionResult<T> = Result<T, CompressionError>;
