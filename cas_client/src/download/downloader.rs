use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use cas_types::{CASReconstructionFetchInfo, CASReconstructionTerm, ContentHash, FileRange, QueryReconstructionResponse};
use casfetch_config::{CasfetchConfig, config};
use lazy_static::lazy_static;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, event};

use super::term_download::{FetchRangeKey, FetchTermDownload, FetchTermDownloadInner};
use crate::error::{CasClientError, Result};
use crate::interface::{Client, FetchedXorb};
use crate::output_provider::{FileProvider, OutputSink};
use crate::remote_client::RemoteClient;
use crate::token_provider::TokenProvider;
use crate::INFORMATION_LOG_LEVEL;

lazy_static! {
    static ref FN_CALL_ID: AtomicU64 = AtomicU64::new(1);
}

/// One term of the plan resolved against its fetch info.
#[derive(Debug, Clone)]
struct TermPlan {
    term: CASReconstructionTerm,
    fetch_term: CASReconstructionFetchInfo,
    key: FetchRangeKey,
}

/// Downloads files from CAS by reconstruction plan: validates the file id,
/// obtains credentials, fetches the plan, then fetches and splices xorb ranges
/// into the output in plan order with bounded prefetch ahead of the splice
/// cursor.
pub struct FileDownloader {
    client: Arc<dyn Client>,
    config: Arc<CasfetchConfig>,
    fetch_semaphore: Arc<Semaphore>,
}

impl FileDownloader {
    /// A downloader using the process-wide configuration.
    pub fn new(token_provider: Arc<TokenProvider>) -> Result<Arc<Self>> {
        Self::new_with_config(token_provider, config().clone())
    }

    /// A downloader with an explicit configuration.
    pub fn new_with_config(token_provider: Arc<TokenProvider>, config: CasfetchConfig) -> Result<Arc<Self>> {
        let client = RemoteClient::new(token_provider, &config, "")?;
        Ok(Self::from_client(client, config))
    }

    /// A downloader over any [`Client`] implementation; the seam tests use to
    /// control fetch behavior.
    pub fn from_client(client: Arc<dyn Client>, config: CasfetchConfig) -> Arc<Self> {
        let fetch_permits = config
            .client
            .max_concurrent_fetches
            .max(config.client.pool_size.max(1) * config.client.connections_per_host)
            .max(1);

        Arc::new(Self {
            client,
            config: Arc::new(config),
            fetch_semaphore: Arc::new(Semaphore::new(fetch_permits)),
        })
    }

    /// Download a file (or a byte range of it) into memory.
    pub async fn download(&self, file_id: &str, byte_range: Option<FileRange>) -> Result<Vec<u8>> {
        // Validate before any network traffic.
        let file_id: ContentHash = file_id.parse()?;

        let mut sink = OutputSink::memory();
        self.run_download(&file_id, byte_range, &mut sink).await?;
        Ok(sink.into_memory().unwrap_or_default())
    }

    /// Download a file (or a byte range of it) to `path`, creating the file and
    /// truncating any previous contents. Returns the number of bytes written.
    pub async fn download_to_file(
        &self,
        file_id: &str,
        byte_range: Option<FileRange>,
        path: impl AsRef<Path>,
    ) -> Result<u64> {
        // Validate before the destination is touched.
        let file_id: ContentHash = file_id.parse()?;

        let mut sink = OutputSink::file(FileProvider::create(path.as_ref())?);
        self.run_download(&file_id, byte_range, &mut sink).await
    }

    async fn run_download(
        &self,
        file_id: &ContentHash,
        byte_range: Option<FileRange>,
        sink: &mut OutputSink,
    ) -> Result<u64> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_id = %file_id.hex_prefix(),
            ?byte_range,
            "Starting download",
        );

        // An empty range produces empty output with zero HTTP calls.
        if byte_range.is_some_and(|r| r.is_empty()) {
            return Ok(0);
        }

        let manifest = self.client.get_reconstruction(file_id, byte_range).await?;
        let (plans, mut hash_usage) = build_term_plans(&manifest)?;
        let expected_sizes = expected_fetch_sizes(&plans);

        let mut remaining: Option<u64> = byte_range.map(|r| r.length());
        let mut skip = manifest.offset_into_first_range;
        let mut write_offset: u64 = 0;

        let mut downloads: HashMap<FetchRangeKey, Arc<FetchTermDownload>> = HashMap::new();
        let mut started: HashSet<FetchRangeKey> = HashSet::new();
        let mut cache: HashMap<FetchRangeKey, Arc<FetchedXorb>> = HashMap::new();

        // Aborts outstanding prefetches when the download ends, normally or not.
        let mut prefetch_tasks = PrefetchTasks::default();

        let max_prefetch = self.config.client.max_concurrent_fetches.max(1);

        for current in 0..plans.len() {
            if remaining == Some(0) {
                break;
            }

            // Keep up to `max_prefetch` term fetches in flight, the current
            // term included.
            for plan in plans[current..].iter().take(max_prefetch) {
                if cache.contains_key(&plan.key) || started.contains(&plan.key) {
                    continue;
                }

                let download = downloads
                    .entry(plan.key.clone())
                    .or_insert_with(|| {
                        Arc::new(FetchTermDownload::new(FetchTermDownloadInner {
                            hash: plan.term.hash,
                            fetch_term: plan.fetch_term.clone(),
                            expected_total_size: expected_sizes.get(&plan.key).copied(),
                            fetch_semaphore: self.fetch_semaphore.clone(),
                        }))
                    })
                    .clone();

                let client = self.client.clone();
                prefetch_tasks.push(tokio::spawn(async move {
                    let _ = download.run(client).await;
                }));
                started.insert(plan.key.clone());
            }

            let plan = &plans[current];
            debug!(
                call_id,
                xorb = %plan.term.hash.hex_prefix(),
                term_range = ?plan.term.range,
                "Processing term",
            );

            let fetched = match cache.get(&plan.key) {
                Some(fetched) => fetched.clone(),
                None => {
                    let download = downloads
                        .remove(&plan.key)
                        .ok_or_else(|| CasClientError::InternalError("term download missing from schedule".into()))?;
                    let fetched = download.run(self.client.clone()).await?;

                    // Worth holding only while later terms still reference the xorb.
                    if hash_usage.get(&plan.term.hash).copied().unwrap_or(0) > 1 {
                        cache.insert(plan.key.clone(), fetched.clone());
                    }
                    fetched
                },
            };

            let written = splice_term(&fetched, &plan.term, &mut skip, &mut remaining, write_offset, sink)?;
            write_offset += written;

            // Last reference to this xorb gone: its cached ranges can go too.
            if let Some(count) = hash_usage.get_mut(&plan.term.hash) {
                *count -= 1;
                if *count == 0 {
                    let hash = plan.term.hash;
                    cache.retain(|key, _| key.hash != hash);
                }
            }
        }

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_id = %file_id.hex_prefix(),
            bytes_written = write_offset,
            "Completed download",
        );

        Ok(write_offset)
    }
}

/// Outstanding prefetch task handles; aborted on drop so an error (or early
/// truncation) cancels every in-flight fetch.
#[derive(Default)]
struct PrefetchTasks(Vec<JoinHandle<()>>);

impl PrefetchTasks {
    fn push(&mut self, handle: JoinHandle<()>) {
        self.0.push(handle);
    }
}

impl Drop for PrefetchTasks {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Resolve every non-empty term against the first fetch info covering its
/// chunk range, and count terms per xorb hash. A hash referenced more than
/// once is cacheable for the duration of the download.
fn build_term_plans(
    manifest: &QueryReconstructionResponse,
) -> Result<(Vec<TermPlan>, HashMap<ContentHash, usize>)> {
    let mut plans = Vec::with_capacity(manifest.terms.len());
    let mut hash_usage: HashMap<ContentHash, usize> = HashMap::new();

    for term in &manifest.terms {
        if term.range.start > term.range.end {
            return Err(CasClientError::MalformedReconstruction(format!(
                "term for xorb {} has inverted chunk range {:?}",
                term.hash.hex_prefix(),
                term.range
            )));
        }

        // Legal, but contributes no bytes and needs no fetch.
        if term.range.start == term.range.end {
            continue;
        }

        let infos = manifest.fetch_info.get(&term.hash).ok_or_else(|| {
            CasClientError::MalformedReconstruction(format!(
                "no fetch info for xorb {}",
                term.hash.hex_prefix()
            ))
        })?;

        let fetch_term = infos
            .iter()
            .find(|info| info.range.contains_range(&term.range))
            .ok_or_else(|| {
                CasClientError::MalformedReconstruction(format!(
                    "term chunk range {:?} of xorb {} not covered by any fetch info",
                    term.range,
                    term.hash.hex_prefix()
                ))
            })?
            .clone();

        let key = FetchRangeKey {
            hash: term.hash,
            chunk_range: fetch_term.range,
            url_range: fetch_term.url_range,
        };

        *hash_usage.entry(term.hash).or_insert(0) += 1;
        plans.push(TermPlan {
            term: term.clone(),
            fetch_term,
            key,
        });
    }

    Ok((plans, hash_usage))
}

/// The exact decompressed size of each fetch, where the plan determines it:
/// when the distinct term ranges sharing a fetch key tile the fetched chunk
/// range exactly, the fetch decodes to the sum of their unpacked lengths.
/// Fetches covering chunks no term names decode to an unknown size.
fn expected_fetch_sizes(plans: &[TermPlan]) -> HashMap<FetchRangeKey, u64> {
    let mut ranges_by_key: HashMap<FetchRangeKey, HashMap<(u32, u32), u64>> = HashMap::new();

    for plan in plans {
        ranges_by_key
            .entry(plan.key.clone())
            .or_default()
            .insert((plan.term.range.start, plan.term.range.end), plan.term.unpacked_length as u64);
    }

    let mut sizes = HashMap::new();
    for (key, ranges) in ranges_by_key {
        let mut spans: Vec<((u32, u32), u64)> = ranges.into_iter().collect();
        spans.sort_unstable_by_key(|(range, _)| *range);

        let mut cursor = key.chunk_range.start;
        let mut total: u64 = 0;
        let mut tiled = true;
        for ((start, end), unpacked) in spans {
            if start != cursor {
                tiled = false;
                break;
            }
            cursor = end;
            total += unpacked;
        }

        if tiled && cursor == key.chunk_range.end {
            sizes.insert(key, total);
        }
    }
    sizes
}

/// Slice this term's bytes out of the fetched xorb, apply the leading skip and
/// the remaining-byte budget, and write at the absolute output offset.
/// Returns the number of bytes written.
fn splice_term(
    fetched: &FetchedXorb,
    term: &CASReconstructionTerm,
    skip: &mut u64,
    remaining: &mut Option<u64>,
    write_offset: u64,
    sink: &mut OutputSink,
) -> Result<u64> {
    let mut slice = fetched.chunk_slice(term.range.start, term.range.end).ok_or_else(|| {
        CasClientError::MalformedReconstruction(format!(
            "xorb {} decoded fewer chunks than fetch info {:?} promised",
            term.hash.hex_prefix(),
            fetched.chunk_range
        ))
    })?;

    if slice.len() != term.unpacked_length as usize {
        return Err(CasClientError::MalformedReconstruction(format!(
            "term of xorb {} decodes to {} bytes, expected unpacked length {}",
            term.hash.hex_prefix(),
            slice.len(),
            term.unpacked_length
        )));
    }

    if *skip > 0 {
        let dropped = (*skip).min(slice.len() as u64);
        slice = slice.slice(dropped as usize..);
        *skip -= dropped;
    }

    if let Some(budget) = remaining {
        if slice.len() as u64 > *budget {
            slice = slice.slice(..*budget as usize);
        }
    }

    if slice.is_empty() {
        return Ok(0);
    }

    sink.write_at(write_offset, &slice)?;

    if let Some(budget) = remaining {
        *budget -= slice.len() as u64;
    }

    Ok(slice.len() as u64)
}
