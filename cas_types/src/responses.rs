use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ChunkRange, ContentHash, HttpRange};

/// One term of a reconstruction plan: a contiguous chunk range within a single
/// xorb, together with the total decompressed size of those chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CASReconstructionTerm {
    pub hash: ContentHash,
    pub unpacked_length: u32,
    pub range: ChunkRange,
}

/// A presigned fetch covering one or more chunks of a xorb: the chunk range
/// served, the URL to GET, and the byte range of the serialized xorb to request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CASReconstructionFetchInfo {
    pub url: String,
    pub range: ChunkRange,
    pub url_range: HttpRange,
}

/// The reconstruction endpoint response: terms in file order plus, per xorb
/// hash, the fetch infos that can serve them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryReconstructionResponse {
    /// Bytes to discard from the start of the first term's output; nonzero when
    /// a requested byte range begins mid-term.
    pub offset_into_first_range: u64,
    pub terms: Vec<CASReconstructionTerm>,
    pub fetch_info: HashMap<ContentHash, Vec<CASReconstructionFetchInfo>>,
}

/// The token endpoint response. The endpoint speaks camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    /// Expiration as UNIX seconds.
    pub exp: u64,
    pub cas_url: String,
}
