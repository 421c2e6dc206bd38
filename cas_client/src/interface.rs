use bytes::Bytes;
use cas_types::{CASReconstructionFetchInfo, ChunkRange, ContentHash, FileRange, QueryReconstructionResponse};

use crate::error::Result;

/// The decoded contents of one fetched xorb byte range.
#[derive(Debug, Clone)]
pub struct FetchedXorb {
    /// Decompressed chunk payloads, concatenated.
    pub data: Bytes,
    /// Byte offset of each chunk boundary within `data`; length is the chunk
    /// count plus one, with the total length as the final entry.
    pub chunk_byte_indices: Vec<u32>,
    /// The chunk index range of the xorb this fetch covers.
    pub chunk_range: ChunkRange,
}

impl FetchedXorb {
    /// The decompressed bytes of chunks `[lo, hi)`, which must lie within
    /// `chunk_range`. Returns None when the decoded xorb holds fewer chunks
    /// than the range requires.
    pub fn chunk_slice(&self, lo: u32, hi: u32) -> Option<Bytes> {
        debug_assert!(self.chunk_range.start <= lo && lo <= hi);
        let start_idx = (lo - self.chunk_range.start) as usize;
        let end_idx = (hi - self.chunk_range.start) as usize;
        if end_idx >= self.chunk_byte_indices.len() {
            return None;
        }
        let start = self.chunk_byte_indices[start_idx] as usize;
        let end = self.chunk_byte_indices[end_idx] as usize;
        Some(self.data.slice(start..end))
    }
}

/// Access to the CAS reconstruction API and xorb blob fetches.
///
/// The download scheduler works against this trait; `RemoteClient` is the
/// production implementation, and tests substitute doubles to control fetch
/// completion order and failure injection.
#[async_trait::async_trait]
pub trait Client: Send + Sync {
    /// Query the reconstruction plan for a file, optionally restricted to a
    /// byte range of it.
    async fn get_reconstruction(
        &self,
        file_id: &ContentHash,
        byte_range: Option<FileRange>,
    ) -> Result<QueryReconstructionResponse>;

    /// Fetch one xorb byte range and decode its chunks.
    ///
    /// `expected_total_size` is the exact decompressed size when the caller
    /// can derive it from the plan, enabling a single preallocated output.
    async fn get_xorb_range(
        &self,
        fetch_term: &CASReconstructionFetchInfo,
        expected_total_size: Option<u64>,
    ) -> Result<FetchedXorb>;
}
