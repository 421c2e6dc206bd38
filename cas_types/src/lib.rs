mod content_hash;
mod ranges;
mod responses;

pub use content_hash::{ContentHash, HashParseError};
pub use ranges::{ChunkRange, FileRange, HttpRange};
pub use responses::{CASReconstructionFetchInfo, CASReconstructionTerm, QueryReconstructionResponse, TokenResponse};
