//! Codec for the xorb chunk container format.
//!
//! A xorb is a concatenation of chunks, each an 8-byte header followed by a
//! compressed payload. This crate parses the container, decompresses chunk
//! payloads (verbatim, LZ4 raw block, or byte-grouped LZ4), and exposes both a
//! streaming chunk iterator and batch deserializers that assemble the
//! decompressed byte stream together with chunk boundary offsets.

pub mod bg4;
mod byte_cursor;
mod deserialize;
pub mod error;
mod header;
pub mod lz4;
pub mod lz4_frame;

pub mod test_utils;

pub use byte_cursor::ByteCursor;
pub use deserialize::{
    ChunkStreamDecoder, deserialize_chunks_from_stream, deserialize_chunks_preallocated, deserialize_chunks_with_hint,
};
pub use error::XorbCodecError;
pub use header::{CHUNK_HEADER_LEN, ChunkHeader, CompressionScheme, MAX_CHUNK_SIZE};
