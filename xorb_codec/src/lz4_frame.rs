//! Standard LZ4 frame decoding.
//!
//! Xorbs carry raw blocks only; this passthrough exists for interoperability
//! with externally produced LZ4 data. Checksums are read and discarded, not
//! validated.

use crate::lz4::{Lz4Error, Result, decompress_into};

/// Little-endian frame magic `04 22 4D 18`.
pub const LZ4_FRAME_MAGIC: u32 = 0x184D2204;

const FLG_VERSION_BITS: u8 = 0b01;

/// Whether `src` begins with the standard LZ4 frame magic.
pub fn is_lz4_frame(src: &[u8]) -> bool {
    src.len() >= 4 && u32::from_le_bytes([src[0], src[1], src[2], src[3]]) == LZ4_FRAME_MAGIC
}

/// Decode a standard LZ4 frame to its content bytes.
pub fn decompress_frame(src: &[u8]) -> Result<Vec<u8>> {
    let mut ip = 0;

    if !is_lz4_frame(src) {
        return Err(Lz4Error::InvalidFrame("missing frame magic"));
    }
    ip += 4;

    let flg = read_byte(src, &mut ip)?;
    if (flg >> 6) != FLG_VERSION_BITS {
        return Err(Lz4Error::InvalidFrame("unsupported frame version"));
    }
    let has_block_checksum = flg & 0x10 != 0;
    let has_content_size = flg & 0x08 != 0;
    let has_content_checksum = flg & 0x04 != 0;
    let has_dict_id = flg & 0x01 != 0;

    let bd = read_byte(src, &mut ip)?;
    let block_max_size = match (bd >> 4) & 0x07 {
        4 => 64 * 1024,
        5 => 256 * 1024,
        6 => 1024 * 1024,
        7 => 4 * 1024 * 1024,
        _ => return Err(Lz4Error::InvalidFrame("invalid block size descriptor")),
    };

    let content_size = if has_content_size {
        let bytes = read_exact(src, &mut ip, 8)?;
        Some(u64::from_le_bytes(bytes.try_into().unwrap()))
    } else {
        None
    };

    if has_dict_id {
        read_exact(src, &mut ip, 4)?;
    }

    // Header checksum byte, not validated.
    read_byte(src, &mut ip)?;

    let mut out = Vec::with_capacity(content_size.unwrap_or(0).min(16 * 1024 * 1024) as usize);
    let mut scratch = vec![0u8; block_max_size];

    loop {
        let bytes = read_exact(src, &mut ip, 4)?;
        let block_size_word = u32::from_le_bytes(bytes.try_into().unwrap());
        if block_size_word == 0 {
            break;
        }

        let is_uncompressed = block_size_word & 0x8000_0000 != 0;
        let block_size = (block_size_word & 0x7fff_ffff) as usize;
        if block_size > block_max_size {
            return Err(Lz4Error::InvalidFrame("block exceeds declared maximum size"));
        }

        let block = read_exact(src, &mut ip, block_size)?;
        if is_uncompressed {
            out.extend_from_slice(block);
        } else {
            let written = decompress_into(block, &mut scratch)?;
            out.extend_from_slice(&scratch[..written]);
        }

        if has_block_checksum {
            read_exact(src, &mut ip, 4)?;
        }
    }

    if has_content_checksum {
        read_exact(src, &mut ip, 4)?;
    }

    if let Some(expected) = content_size {
        if out.len() as u64 != expected {
            return Err(Lz4Error::InvalidFrame("content size mismatch"));
        }
    }

    Ok(out)
}

fn read_byte(src: &[u8], ip: &mut usize) -> Result<u8> {
    let Some(&b) = src.get(*ip) else {
        return Err(Lz4Error::TruncatedInput);
    };
    *ip += 1;
    Ok(b)
}

fn read_exact<'a>(src: &'a [u8], ip: &mut usize, n: usize) -> Result<&'a [u8]> {
    if *ip + n > src.len() {
        return Err(Lz4Error::TruncatedInput);
    }
    let slice = &src[*ip..*ip + n];
    *ip += n;
    Ok(slice)
}
