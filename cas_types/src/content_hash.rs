use std::fmt;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashParseError {
    #[error("hash string must be exactly 64 characters, got {0}")]
    InvalidLength(usize),

    #[error("hash string must be lowercase hexadecimal")]
    InvalidCharacter,
}

/// A 256-bit content hash, the address of a file or xorb in CAS.
///
/// The canonical text form is 64 lowercase hexadecimal characters; anything
/// else is rejected before it can reach the network layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn from_hex(hex: &str) -> Result<Self, HashParseError> {
        if hex.len() != 64 {
            return Err(HashParseError::InvalidLength(hex.len()));
        }

        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            let hi = hex_val(hex.as_bytes()[2 * i])?;
            let lo = hex_val(hex.as_bytes()[2 * i + 1])?;
            *byte = (hi << 4) | lo;
        }
        Ok(Self(out))
    }

    pub fn hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in self.0 {
            s.push(HEX_DIGITS[(b >> 4) as usize] as char);
            s.push(HEX_DIGITS[(b & 0xf) as usize] as char);
        }
        s
    }

    /// The first 20 hex characters, for use in log and error messages.
    pub fn hex_prefix(&self) -> String {
        let mut s = self.hex();
        s.truncate(20);
        s
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

fn hex_val(c: u8) -> Result<u8, HashParseError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        _ => Err(HashParseError::InvalidCharacter),
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

impl FromStr for ContentHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(D::Error::custom)
    }
}
