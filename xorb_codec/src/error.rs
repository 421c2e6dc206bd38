use thiserror::Error;

use crate::lz4::Lz4Error;

/// Errors raised while parsing or decoding a xorb chunk stream.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum XorbCodecError {
    #[error("Unsupported chunk version: {0}")]
    UnsupportedVersion(u8),

    #[error("Unsupported compression scheme: {0}")]
    UnsupportedScheme(u8),

    #[error("Invalid chunk header: expected {expected} bytes, got {actual}")]
    InvalidHeaderLength { expected: usize, actual: usize },

    #[error("Chunk length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("Truncated chunk stream: stream ended inside a chunk")]
    TruncatedStream,

    #[error("LZ4 error: {0}")]
    Lz4Error(#[from] Lz4Error),

    #[error("Internal IO error: {0}")]
    InternalIOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, XorbCodecError>;
