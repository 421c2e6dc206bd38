use std::sync::Arc;

use cas_types::{CASReconstructionFetchInfo, ChunkRange, ContentHash, HttpRange};
use derivative::Derivative;
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::interface::{Client, FetchedXorb};

/// Identifies one fetched xorb byte range within a download: the xorb hash
/// plus the chunk and URL ranges of the fetch info serving it. Terms with the
/// same key are satisfied by the same HTTP fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FetchRangeKey {
    pub hash: ContentHash,
    pub chunk_range: ChunkRange,
    pub url_range: HttpRange,
}

/// The inputs needed to fetch and decode one xorb range.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub(crate) struct FetchTermDownloadInner {
    pub hash: ContentHash,
    pub fetch_term: CASReconstructionFetchInfo,
    /// Exact decompressed size when the plan's terms tile the fetched range.
    pub expected_total_size: Option<u64>,
    #[derivative(Debug = "ignore")]
    pub fetch_semaphore: Arc<Semaphore>,
}

impl FetchTermDownloadInner {
    async fn run(self, client: Arc<dyn Client>) -> Result<Arc<FetchedXorb>> {
        // The permit bounds concurrent HTTP fetches; held until the response
        // is fully consumed and decoded.
        let _permit = self.fetch_semaphore.acquire_owned().await?;
        let fetched = client.get_xorb_range(&self.fetch_term, self.expected_total_size).await?;
        Ok(Arc::new(fetched))
    }
}

/// A once-only xorb range fetch shared between the prefetcher and the splice
/// loop. However many tasks call [`run`](Self::run), the fetch executes once
/// and every caller receives the same result.
#[derive(Debug)]
pub(crate) struct FetchTermDownload {
    inner: FetchTermDownloadInner,
    cell: tokio::sync::OnceCell<Result<Arc<FetchedXorb>>>,
}

impl FetchTermDownload {
    pub fn new(inner: FetchTermDownloadInner) -> Self {
        Self {
            inner,
            cell: tokio::sync::OnceCell::new(),
        }
    }

    pub async fn run(&self, client: Arc<dyn Client>) -> Result<Arc<FetchedXorb>> {
        self.cell
            .get_or_init(|| self.inner.clone().run(client))
            .await
            .clone()
    }
}
