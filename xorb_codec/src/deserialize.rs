//! Streaming deserialization of a xorb chunk stream.
//!
//! The input is an async sequence of byte buffers (an HTTP response body, a
//! file reader). Chunks are emitted as soon as their header and payload are
//! fully buffered; the producer is never blocked by decode. A xorb has no
//! outer length, so the stream runs to EOF; EOF inside a chunk is a
//! truncation error.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::byte_cursor::ByteCursor;
use crate::error::{Result, XorbCodecError};
use crate::header::{CHUNK_HEADER_LEN, ChunkHeader, CompressionScheme};
use crate::{bg4, lz4};

/// Decompress one chunk payload into `out`, which must be sized to the
/// header's uncompressed length.
fn decompress_payload(header: &ChunkHeader, payload: &[u8], out: &mut [u8]) -> Result<()> {
    debug_assert_eq!(payload.len(), header.compressed_length as usize);
    debug_assert_eq!(out.len(), header.uncompressed_length as usize);

    match header.scheme {
        CompressionScheme::None => {
            if header.compressed_length != header.uncompressed_length {
                return Err(XorbCodecError::LengthMismatch {
                    expected: header.uncompressed_length as u64,
                    actual: header.compressed_length as u64,
                });
            }
            out.copy_from_slice(payload);
        },
        CompressionScheme::LZ4 => {
            let written = lz4::decompress_into(payload, out)?;
            if written != out.len() {
                return Err(XorbCodecError::LengthMismatch {
                    expected: out.len() as u64,
                    actual: written as u64,
                });
            }
        },
        CompressionScheme::ByteGrouping4LZ4 => {
            let mut grouped = vec![0u8; out.len()];
            let written = lz4::decompress_into(payload, &mut grouped)?;
            if written != grouped.len() {
                return Err(XorbCodecError::LengthMismatch {
                    expected: grouped.len() as u64,
                    actual: written as u64,
                });
            }
            bg4::regroup_into(&grouped, out);
        },
    }

    Ok(())
}

/// Pulls chunks one at a time out of an async byte source.
pub struct ChunkStreamDecoder<S> {
    stream: S,
    cursor: ByteCursor,
    eof: bool,
}

impl<S> ChunkStreamDecoder<S>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            cursor: ByteCursor::new(),
            eof: false,
        }
    }

    /// Buffer input until a complete chunk (header plus payload) is available,
    /// returning its header. Returns None on a clean end of stream.
    async fn buffer_next_chunk(&mut self) -> Result<Option<ChunkHeader>> {
        loop {
            if self.cursor.len() >= CHUNK_HEADER_LEN {
                let header = ChunkHeader::parse(&self.cursor.as_slice()[..CHUNK_HEADER_LEN])?;
                if self.cursor.len() >= CHUNK_HEADER_LEN + header.compressed_length as usize {
                    return Ok(Some(header));
                }
            }

            if self.eof {
                return if self.cursor.is_empty() {
                    Ok(None)
                } else {
                    Err(XorbCodecError::TruncatedStream)
                };
            }

            match self.stream.next().await {
                Some(Ok(bytes)) => self.cursor.extend_from_slice(&bytes),
                Some(Err(e)) => return Err(XorbCodecError::InternalIOError(e)),
                None => self.eof = true,
            }
        }
    }

    /// The next decompressed chunk, or None at the end of the xorb.
    pub async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(header) = self.buffer_next_chunk().await? else {
            return Ok(None);
        };

        let chunk_len = CHUNK_HEADER_LEN + header.compressed_length as usize;
        let mut out = vec![0u8; header.uncompressed_length as usize];
        decompress_payload(&header, &self.cursor.as_slice()[CHUNK_HEADER_LEN..chunk_len], &mut out)?;
        self.cursor.consume(chunk_len);

        Ok(Some(out))
    }
}

/// Deserialize a full xorb stream into its decompressed bytes plus the byte
/// offset of each chunk boundary (length = chunk count + 1, final entry is the
/// total length).
pub async fn deserialize_chunks_from_stream<S>(stream: S) -> Result<(Vec<u8>, Vec<u32>)>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    deserialize_chunks_with_hint(stream, None).await
}

/// As [`deserialize_chunks_from_stream`], reserving `size_hint` bytes up front
/// when the caller can estimate the decompressed size.
pub async fn deserialize_chunks_with_hint<S>(stream: S, size_hint: Option<usize>) -> Result<(Vec<u8>, Vec<u32>)>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    let mut decoder = ChunkStreamDecoder::new(stream);
    let mut data = Vec::with_capacity(size_hint.unwrap_or(0));
    let mut chunk_byte_indices = vec![0u32];

    while let Some(chunk) = decoder.next_chunk().await? {
        data.extend_from_slice(&chunk);
        chunk_byte_indices.push(data.len() as u32);
    }

    Ok((data, chunk_byte_indices))
}

/// Deserialize a xorb stream whose total decompressed size is known exactly.
///
/// A single `total_size` buffer is allocated up front and every chunk is
/// decompressed directly into place, avoiding per-chunk allocations. A stream
/// decoding to anything other than `total_size` bytes is a length mismatch.
pub async fn deserialize_chunks_preallocated<S>(stream: S, total_size: u64) -> Result<(Vec<u8>, Vec<u32>)>
where
    S: Stream<Item = std::io::Result<Bytes>> + Unpin,
{
    let mut decoder = ChunkStreamDecoder::new(stream);
    let mut data = vec![0u8; total_size as usize];
    let mut chunk_byte_indices = vec![0u32];
    let mut written: usize = 0;

    while let Some(header) = decoder.buffer_next_chunk().await? {
        let uncompressed = header.uncompressed_length as usize;
        if written + uncompressed > data.len() {
            return Err(XorbCodecError::LengthMismatch {
                expected: total_size,
                actual: (written + uncompressed) as u64,
            });
        }

        let chunk_len = CHUNK_HEADER_LEN + header.compressed_length as usize;
        decompress_payload(
            &header,
            &decoder.cursor.as_slice()[CHUNK_HEADER_LEN..chunk_len],
            &mut data[written..written + uncompressed],
        )?;
        decoder.cursor.consume(chunk_len);

        written += uncompressed;
        chunk_byte_indices.push(written as u32);
    }

    if written as u64 != total_size {
        return Err(XorbCodecError::LengthMismatch {
            expected: total_size,
            actual: written as u64,
        });
    }

    Ok((data, chunk_byte_indices))
}
