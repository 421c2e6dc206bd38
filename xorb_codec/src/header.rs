use crate::error::{Result, XorbCodecError};

/// Size of the chunk header on the wire.
pub const CHUNK_HEADER_LEN: usize = 8;

/// Chunk lengths are 24-bit fields, bounding a single chunk to 16 MiB - 1.
pub const MAX_CHUNK_SIZE: u32 = (1 << 24) - 1;

/// How a chunk payload is compressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionScheme {
    /// Payload stored verbatim; compressed and uncompressed lengths must match.
    None = 0,
    /// Payload is an LZ4 raw block.
    LZ4 = 1,
    /// Payload is an LZ4 raw block whose decoded bytes are BG4-grouped.
    ByteGrouping4LZ4 = 2,
}

impl TryFrom<u8> for CompressionScheme {
    type Error = XorbCodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(CompressionScheme::None),
            1 => Ok(CompressionScheme::LZ4),
            2 => Ok(CompressionScheme::ByteGrouping4LZ4),
            other => Err(XorbCodecError::UnsupportedScheme(other)),
        }
    }
}

/// The 8-byte chunk header.
///
/// Layout, little-endian where applicable:
/// byte 0 version (must be 0), bytes 1-3 compressed length, byte 4 scheme,
/// bytes 5-7 uncompressed length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub compressed_length: u32,
    pub uncompressed_length: u32,
    pub scheme: CompressionScheme,
}

impl ChunkHeader {
    pub fn new(scheme: CompressionScheme, compressed_length: u32, uncompressed_length: u32) -> Self {
        debug_assert!(compressed_length <= MAX_CHUNK_SIZE);
        debug_assert!(uncompressed_length <= MAX_CHUNK_SIZE);
        Self {
            compressed_length,
            uncompressed_length,
            scheme,
        }
    }

    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() != CHUNK_HEADER_LEN {
            return Err(XorbCodecError::InvalidHeaderLength {
                expected: CHUNK_HEADER_LEN,
                actual: buf.len(),
            });
        }

        let version = buf[0];
        if version != 0 {
            return Err(XorbCodecError::UnsupportedVersion(version));
        }

        let compressed_length = u32::from_le_bytes([buf[1], buf[2], buf[3], 0]);
        let scheme = CompressionScheme::try_from(buf[4])?;
        let uncompressed_length = u32::from_le_bytes([buf[5], buf[6], buf[7], 0]);

        Ok(Self {
            compressed_length,
            uncompressed_length,
            scheme,
        })
    }

    pub fn serialize(&self) -> [u8; CHUNK_HEADER_LEN] {
        let c = self.compressed_length.to_le_bytes();
        let u = self.uncompressed_length.to_le_bytes();
        [0, c[0], c[1], c[2], self.scheme as u8, u[0], u[1], u[2]]
    }
}
