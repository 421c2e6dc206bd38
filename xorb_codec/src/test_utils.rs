//! Utilities for building valid xorbs in tests.
//!
//! Downloads only ever decode xorbs, so the serialization side lives here:
//! enough of an encoder to produce well-formed chunks under every compression
//! scheme, plus a greedy LZ4 block compressor for generating real
//! match-bearing blocks.

use bytes::Bytes;
use futures::Stream;
use rand::Rng;

use crate::bg4;
use crate::header::{ChunkHeader, CompressionScheme};

const MIN_MATCH: usize = 4;
const MAX_OFFSET: usize = 65_535;
const HASH_BITS: u32 = 14;

/// Compress `input` into an LZ4 raw block using a greedy hash-chain match
/// finder. Correctness over ratio; this exists to exercise the decoder.
pub fn lz4_compress_block(input: &[u8]) -> Vec<u8> {
    let len = input.len();
    let mut out = Vec::with_capacity(len + len / 255 + 16);
    if len == 0 {
        return out;
    }

    let mut table = vec![0u32; 1 << HASH_BITS];
    let mut anchor = 0usize;
    let mut pos = 0usize;
    // Keep the tail as literals so a match never needs bytes past the end.
    let match_limit = len.saturating_sub(5);

    while pos < match_limit {
        let seq = read_u32_le(input, pos);
        let slot = hash(seq);
        let candidate = table[slot] as usize;
        table[slot] = pos as u32;

        if candidate > 0 && pos - candidate <= MAX_OFFSET && read_u32_le(input, candidate) == seq {
            let offset = pos - candidate;
            let mut match_len = MIN_MATCH;
            while pos + match_len < len && input[candidate + match_len] == input[pos + match_len] {
                match_len += 1;
            }

            emit_sequence(&mut out, &input[anchor..pos], offset, match_len);
            pos += match_len;
            anchor = pos;
        } else {
            pos += 1;
        }
    }

    emit_last_literals(&mut out, &input[anchor..]);
    out
}

fn hash(seq: u32) -> usize {
    (seq.wrapping_mul(2654435761) >> (32 - HASH_BITS)) as usize
}

fn read_u32_le(data: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
}

fn length_nibble(v: usize) -> u8 {
    v.min(15) as u8
}

fn emit_extension(out: &mut Vec<u8>, v: usize) {
    if v >= 15 {
        let mut rem = v - 15;
        while rem >= 255 {
            out.push(255);
            rem -= 255;
        }
        out.push(rem as u8);
    }
}

fn emit_sequence(out: &mut Vec<u8>, literals: &[u8], offset: usize, match_len: usize) {
    let ml = match_len - MIN_MATCH;
    out.push((length_nibble(literals.len()) << 4) | length_nibble(ml));
    emit_extension(out, literals.len());
    out.extend_from_slice(literals);
    out.push(offset as u8);
    out.push((offset >> 8) as u8);
    emit_extension(out, ml);
}

fn emit_last_literals(out: &mut Vec<u8>, literals: &[u8]) {
    out.push(length_nibble(literals.len()) << 4);
    emit_extension(out, literals.len());
    out.extend_from_slice(literals);
}

/// Serialize one chunk (header plus compressed payload) under `scheme`.
pub fn build_chunk(data: &[u8], scheme: CompressionScheme) -> Vec<u8> {
    let payload = match scheme {
        CompressionScheme::None => data.to_vec(),
        CompressionScheme::LZ4 => lz4_compress_block(data),
        CompressionScheme::ByteGrouping4LZ4 => lz4_compress_block(&bg4::split(data)),
    };

    let header = ChunkHeader::new(scheme, payload.len() as u32, data.len() as u32);
    let mut out = header.serialize().to_vec();
    out.extend_from_slice(&payload);
    out
}

/// A serialized xorb plus the serialized byte offset of each chunk boundary
/// (length = chunk count + 1), for carving out sub-ranges the way fetch infos do.
pub struct SerializedXorb {
    pub data: Vec<u8>,
    pub chunk_boundaries: Vec<u64>,
}

impl SerializedXorb {
    /// The serialized byte span `[start, end)` covering chunks `[lo, hi)`.
    pub fn byte_span(&self, lo: usize, hi: usize) -> (u64, u64) {
        (self.chunk_boundaries[lo], self.chunk_boundaries[hi])
    }

    /// The serialized bytes covering chunks `[lo, hi)`.
    pub fn chunk_slice(&self, lo: usize, hi: usize) -> &[u8] {
        let (start, end) = self.byte_span(lo, hi);
        &self.data[start as usize..end as usize]
    }
}

/// Serialize a sequence of chunks into a xorb, all under the same scheme.
pub fn serialize_chunks(chunks: &[Vec<u8>], scheme: CompressionScheme) -> SerializedXorb {
    let mut data = Vec::new();
    let mut chunk_boundaries = vec![0u64];

    for chunk in chunks {
        data.extend(build_chunk(chunk, scheme));
        chunk_boundaries.push(data.len() as u64);
    }

    SerializedXorb { data, chunk_boundaries }
}

/// Chunk data with runs and noise mixed so every compression scheme has work
/// to do without degenerating to pure literals.
pub fn random_chunk_data(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len);
    while out.len() < len {
        let remaining = len - out.len();
        if rng.gen_bool(0.5) {
            let b: u8 = rng.gen();
            let run = rng.gen_range(1..=64).min(remaining);
            out.extend(std::iter::repeat(b).take(run));
        } else {
            let run = rng.gen_range(1..=32).min(remaining);
            out.extend((0..run).map(|_| rng.gen::<u8>()));
        }
    }
    out
}

/// Turn a byte slice into an async stream of `piece_size`-byte buffers, the
/// shape an HTTP response body arrives in.
pub fn bytes_stream(data: &[u8], piece_size: usize) -> impl Stream<Item = std::io::Result<Bytes>> + Unpin {
    let piece = piece_size.clamp(1, data.len().max(1));
    let pieces: Vec<std::io::Result<Bytes>> = data.chunks(piece).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
    futures::stream::iter(pieces)
}
