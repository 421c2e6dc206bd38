use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use cas_types::{CASReconstructionFetchInfo, ContentHash, FileRange, HttpRange, QueryReconstructionResponse};
use casfetch_config::CasfetchConfig;
use futures::StreamExt;
use http::header::RANGE;
use lazy_static::lazy_static;
use tokio::sync::mpsc;
use tracing::{debug, event};
use xorb_codec::{deserialize_chunks_preallocated, deserialize_chunks_with_hint};

use crate::error::{CasClientError, Result};
use crate::http_client::{HttpClientPool, parse_permitted_url};
use crate::interface::{Client, FetchedXorb};
use crate::token_provider::TokenProvider;
use crate::INFORMATION_LOG_LEVEL;

lazy_static! {
    static ref FN_CALL_ID: AtomicU64 = AtomicU64::new(1);
}

/// Production [`Client`] over the CAS HTTP API.
///
/// Reconstruction queries go to the CAS endpoint named by the token provider's
/// credentials; xorb fetches follow the presigned URLs from the plan. Requests
/// are spread round-robin across the client pool.
pub struct RemoteClient {
    token_provider: Arc<TokenProvider>,
    pool: HttpClientPool,
    allow_insecure: bool,
    decoded_buffer_slots: usize,
}

impl RemoteClient {
    pub fn new(token_provider: Arc<TokenProvider>, config: &CasfetchConfig, session_id: &str) -> Result<Arc<Self>> {
        Ok(Arc::new(Self {
            token_provider,
            pool: HttpClientPool::new(&config.client, session_id, "")?,
            allow_insecure: config.client.allow_insecure_urls,
            // floor of two buffers
            decoded_buffer_slots: config.download.decoded_buffer_slots.max(2),
        }))
    }
}

#[async_trait::async_trait]
impl Client for RemoteClient {
    async fn get_reconstruction(
        &self,
        file_id: &ContentHash,
        byte_range: Option<FileRange>,
    ) -> Result<QueryReconstructionResponse> {
        let call_id = FN_CALL_ID.fetch_add(1, Ordering::Relaxed);
        let conn = self.token_provider.connection_info().await?;

        parse_permitted_url(&conn.cas_url, self.allow_insecure)?;
        let url = url::Url::parse(&format!(
            "{}/v1/reconstructions/{}",
            conn.cas_url.trim_end_matches('/'),
            file_id.hex()
        ))?;

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_id = %file_id.hex_prefix(),
            ?byte_range,
            "Starting get_reconstruction API call",
        );

        let mut request = self
            .pool
            .next_client()
            .get(url)
            .bearer_auth(&conn.access_token);
        if let Some(range) = byte_range {
            // convert exclusive-end to inclusive-end range
            request = request.header(RANGE, HttpRange::from(range).range_header());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CasClientError::ReconstructionFailed {
                file_id: file_id.hex_prefix(),
                status: status.as_u16(),
                body,
            });
        }

        let manifest: QueryReconstructionResponse = response
            .json()
            .await
            .map_err(|e| CasClientError::MalformedReconstruction(format!("response decode failed: {e}")))?;

        event!(
            INFORMATION_LOG_LEVEL,
            call_id,
            file_id = %file_id.hex_prefix(),
            term_count = manifest.terms.len(),
            "Completed get_reconstruction API call",
        );

        Ok(manifest)
    }

    async fn get_xorb_range(
        &self,
        fetch_term: &CASReconstructionFetchInfo,
        expected_total_size: Option<u64>,
    ) -> Result<FetchedXorb> {
        let url = parse_permitted_url(&fetch_term.url, self.allow_insecure)?;
        let url_host = url.host_str().unwrap_or_default().to_string();

        debug!(%url_host, url_range = ?fetch_term.url_range, chunk_range = ?fetch_term.range, "Fetching xorb range");

        let host_for_send = url_host.clone();
        let response = self
            .pool
            .next_client()
            .get(url)
            .header(RANGE, fetch_term.url_range.range_header())
            .send()
            .await
            .map_err(|e| CasClientError::FetchFailed {
                url_host: host_for_send,
                status: match &e {
                    reqwest_middleware::Error::Reqwest(inner) => inner.status().map(|s| s.as_u16()),
                    _ => None,
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CasClientError::FetchFailed {
                url_host,
                status: Some(status.as_u16()),
            });
        }

        if let Some(content_length) = response.content_length() {
            let expected_len = fetch_term.url_range.length();
            if content_length != expected_len {
                return Err(CasClientError::RangeLengthMismatch {
                    expected: expected_len,
                    actual: content_length,
                });
            }
        }

        // Stage the body through a bounded channel: the reader task pulls
        // network buffers while the decoder catches up, but can run at most
        // `decoded_buffer_slots` buffers ahead.
        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(self.decoded_buffer_slots);
        let mut body = response.bytes_stream();

        let reader = tokio::spawn(async move {
            while let Some(item) = body.next().await {
                let was_err = item.is_err();
                if tx.send(item.map_err(std::io::Error::other)).await.is_err() {
                    // Decoder dropped its end; stop reading.
                    break;
                }
                if was_err {
                    break;
                }
            }
        });

        let stream = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }));

        let decode_result = match expected_total_size {
            Some(total) => deserialize_chunks_preallocated(stream, total).await,
            None => {
                // Reserve roughly the transfer size; decompressed output is at least that large.
                let hint = usize::try_from(fetch_term.url_range.length()).ok();
                deserialize_chunks_with_hint(stream, hint).await
            },
        };

        // The stream (and its channel receiver) is dropped by now, so the
        // reader cannot block on a full channel; join it before returning.
        reader.await?;

        let (data, chunk_byte_indices) = decode_result?;

        Ok(FetchedXorb {
            data: Bytes::from(data),
            chunk_byte_indices,
            chunk_range: fetch_term.range,
        })
    }
}
