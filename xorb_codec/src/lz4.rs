//! LZ4 raw block decoding.
//!
//! A raw block is a sequence of sequences: a token byte whose high nibble is
//! the literal length and low nibble the match length, optional length
//! extension bytes (add 255 until a byte below 255), the literals, a 2-byte
//! little-endian match offset, and optional match length extension. Match
//! length carries an implicit +4. The final sequence may end after its
//! literals when the input is exhausted.

use thiserror::Error;

/// Minimum match length; the wire format stores match lengths minus this.
const MIN_MATCH: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Lz4Error {
    #[error("truncated LZ4 input")]
    TruncatedInput,

    #[error("invalid LZ4 match offset {offset} at output position {position}")]
    InvalidOffset { offset: usize, position: usize },

    #[error("LZ4 output overflow: block decodes past {limit} bytes")]
    OutputOverflow { limit: usize },

    #[error("invalid LZ4 frame: {0}")]
    InvalidFrame(&'static str),
}

pub type Result<T> = std::result::Result<T, Lz4Error>;

/// Decompress a raw LZ4 block into `output`, returning the number of bytes
/// written. Decoding more than `output.len()` bytes is an overflow error; a
/// short decode is left to the caller to judge, since only it knows the
/// expected size.
pub fn decompress_into(src: &[u8], output: &mut [u8]) -> Result<usize> {
    let mut ip = 0; // input position
    let mut op = 0; // output position

    while ip < src.len() {
        let token = src[ip];
        ip += 1;

        // Literal run.
        let literal_len = read_length(src, &mut ip, (token >> 4) as usize)?;
        if ip + literal_len > src.len() {
            return Err(Lz4Error::TruncatedInput);
        }
        if op + literal_len > output.len() {
            return Err(Lz4Error::OutputOverflow { limit: output.len() });
        }
        output[op..op + literal_len].copy_from_slice(&src[ip..ip + literal_len]);
        ip += literal_len;
        op += literal_len;

        // The final sequence has no match part.
        if ip == src.len() {
            break;
        }

        // Match offset; zero is invalid and the match cannot start before the output.
        if ip + 2 > src.len() {
            return Err(Lz4Error::TruncatedInput);
        }
        let offset = u16::from_le_bytes([src[ip], src[ip + 1]]) as usize;
        ip += 2;
        if offset == 0 || offset > op {
            return Err(Lz4Error::InvalidOffset { offset, position: op });
        }

        let match_len = read_length(src, &mut ip, (token & 0x0f) as usize)? + MIN_MATCH;
        if op + match_len > output.len() {
            return Err(Lz4Error::OutputOverflow { limit: output.len() });
        }

        // Byte-by-byte so overlapping copies (offset < match_len, offset 1 for
        // run-length fills) replicate already-written output.
        for _ in 0..match_len {
            output[op] = output[op - offset];
            op += 1;
        }
    }

    Ok(op)
}

/// Reads length extension bytes when the nibble value saturates at 15.
fn read_length(src: &[u8], ip: &mut usize, nibble: usize) -> Result<usize> {
    let mut len = nibble;
    if nibble == 15 {
        loop {
            let Some(&b) = src.get(*ip) else {
                return Err(Lz4Error::TruncatedInput);
            };
            *ip += 1;
            len += b as usize;
            if b != 255 {
                break;
            }
        }
    }
    Ok(len)
}
