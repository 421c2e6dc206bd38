//! End-to-end download tests against a mocked token endpoint, CAS API, and
//! xorb blob store.
//!
//! Each test stands up a MockServer serving all three roles: `/token` mints
//! credentials pointing the CAS URL back at the server, `/v1/reconstructions/*`
//! serves plans, and `/xorbs/*` serves serialized xorb byte ranges.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cas_client::{CasClientError, FileDownloader, TokenProvider};
use cas_types::{
    CASReconstructionFetchInfo, CASReconstructionTerm, ChunkRange, ContentHash, FileRange, HttpRange,
    QueryReconstructionResponse,
};
use casfetch_config::CasfetchConfig;
use httpmock::Method::GET;
use httpmock::{Mock, MockServer};
use rand::{Rng, SeedableRng};
use xorb_codec::CompressionScheme;
use xorb_codec::test_utils::{SerializedXorb, random_chunk_data, serialize_chunks};

fn hash(tag: &str) -> ContentHash {
    ContentHash::from_hex(&format!("{tag:0>64}")).unwrap()
}

fn test_config() -> CasfetchConfig {
    let mut config = CasfetchConfig::default();
    config.client.allow_insecure_urls = true;
    config.client.max_concurrent_fetches = 8;
    config
}

/// Mount the token endpoint, minting credentials whose CAS URL points back at
/// this server.
fn mount_token(server: &MockServer) -> Mock<'_> {
    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 3600;
    let cas_url = server.base_url();
    server.mock(|when, then| {
        when.method(GET).path("/token");
        then.status(200)
            .header("content-type", "application/json")
            .body(format!(r#"{{"accessToken": "tok", "exp": {exp}, "casUrl": "{cas_url}"}}"#));
    })
}

fn downloader_for(server: &MockServer) -> Arc<FileDownloader> {
    downloader_with_config(server, test_config())
}

fn downloader_with_config(server: &MockServer, config: CasfetchConfig) -> Arc<FileDownloader> {
    let provider = Arc::new(TokenProvider::new(&server.url("/token"), None, &config).unwrap());
    FileDownloader::new_with_config(provider, config).unwrap()
}

/// A xorb known to the mock blob store.
struct TestXorb {
    hash: ContentHash,
    chunks: Vec<Vec<u8>>,
    serialized: SerializedXorb,
}

impl TestXorb {
    fn new(tag: &str, chunks: Vec<Vec<u8>>) -> Self {
        let serialized = serialize_chunks(&chunks, CompressionScheme::ByteGrouping4LZ4);
        Self {
            hash: hash(tag),
            chunks,
            serialized,
        }
    }

    fn random(tag: &str, chunk_sizes: &[usize], rng: &mut impl Rng) -> Self {
        let chunks = chunk_sizes.iter().map(|&len| random_chunk_data(rng, len)).collect();
        Self::new(tag, chunks)
    }

    fn unpacked_len(&self, lo: u32, hi: u32) -> u32 {
        self.chunks[lo as usize..hi as usize].iter().map(|c| c.len() as u32).sum()
    }

    fn unpacked_bytes(&self, lo: u32, hi: u32) -> Vec<u8> {
        self.chunks[lo as usize..hi as usize].concat()
    }
}

/// Mount a blob-store mock serving chunks `[lo, hi)` of this xorb and return
/// the matching fetch info.
fn mount_fetch<'a>(server: &'a MockServer, xorb: &TestXorb, lo: u32, hi: u32) -> (CASReconstructionFetchInfo, Mock<'a>) {
    let (start, end) = xorb.serialized.byte_span(lo as usize, hi as usize);
    let url_range = HttpRange::new(start, end - 1);
    let body = xorb.serialized.chunk_slice(lo as usize, hi as usize).to_vec();

    let path = format!("/xorbs/{}", xorb.hash);
    let mock = server.mock(|when, then| {
        when.method(GET).path(&path).header("range", url_range.range_header());
        then.status(206).body(&body);
    });

    let fetch_info = CASReconstructionFetchInfo {
        url: server.url(&path),
        range: ChunkRange::new(lo, hi),
        url_range,
    };
    (fetch_info, mock)
}

/// Mount a reconstruction plan for `file_id`. When `byte_range` is given the
/// mock requires the matching `Range` header.
fn mount_plan<'a>(
    server: &'a MockServer,
    file_id: &ContentHash,
    byte_range: Option<FileRange>,
    response: &QueryReconstructionResponse,
) -> Mock<'a> {
    let path = format!("/v1/reconstructions/{file_id}");
    server.mock(|when, then| {
        let mut when = when.method(GET).path(&path).header("authorization", "Bearer tok");
        if let Some(range) = byte_range {
            when = when.header("range", HttpRange::from(range).range_header());
        }
        let _ = when;
        then.status(200).json_body_obj(response);
    })
}

fn term(xorb: &TestXorb, lo: u32, hi: u32) -> CASReconstructionTerm {
    CASReconstructionTerm {
        hash: xorb.hash,
        unpacked_length: xorb.unpacked_len(lo, hi),
        range: ChunkRange::new(lo, hi),
    }
}

#[tokio::test]
async fn test_full_download_single_term() {
    let server = MockServer::start_async().await;
    let token_mock = mount_token(&server);

    let mut rng = rand::rngs::StdRng::seed_from_u64(11);
    let xorb = TestXorb::random("aa", &[600, 1200, 350], &mut rng);
    let expected = xorb.unpacked_bytes(0, 3);

    let (fetch_info, fetch_mock) = mount_fetch(&server, &xorb, 0, 3);
    let file_id = hash("f1");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&xorb, 0, 3)],
        fetch_info: HashMap::from([(xorb.hash, vec![fetch_info])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);

    let data = downloader.download(&file_id.hex(), None).await.unwrap();
    assert_eq!(data, expected);

    // Idempotence: a second download returns byte-equal output.
    let again = downloader.download(&file_id.hex(), None).await.unwrap();
    assert_eq!(again, expected);
    assert_eq!(fetch_mock.hits(), 2);

    // The token survives across downloads; only one refresh happened.
    assert_eq!(token_mock.hits(), 1);

    // File output writes the same bytes and reports the written length.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    let written = downloader.download_to_file(&file_id.hex(), None, &path).await.unwrap();
    assert_eq!(written, expected.len() as u64);
    assert_eq!(std::fs::read(&path).unwrap(), expected);
}

#[tokio::test]
async fn test_shared_xorb_fetched_once() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let xorb = TestXorb::new("bb", vec![b"AAAAA".to_vec(), b"BBBBB".to_vec()]);
    let (fetch_info, fetch_mock) = mount_fetch(&server, &xorb, 0, 2);

    let file_id = hash("f2");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&xorb, 0, 1), term(&xorb, 1, 2)],
        fetch_info: HashMap::from([(xorb.hash, vec![fetch_info])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);
    let data = downloader.download(&file_id.hex(), None).await.unwrap();

    assert_eq!(data, b"AAAAABBBBB");
    // Two terms, one xorb range: exactly one GET.
    assert_eq!(fetch_mock.hits(), 1);
}

#[tokio::test]
async fn test_ranged_download_with_leading_offset() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let xorb = TestXorb::new("cc", vec![b"ABCDE".to_vec()]);
    let (fetch_info, _) = mount_fetch(&server, &xorb, 0, 1);

    let file_id = hash("f3");
    let requested = FileRange::new(3, 5);
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 3,
        terms: vec![term(&xorb, 0, 1)],
        fetch_info: HashMap::from([(xorb.hash, vec![fetch_info])]),
    };
    mount_plan(&server, &file_id, Some(requested), &plan);

    let downloader = downloader_for(&server);
    let data = downloader.download(&file_id.hex(), Some(requested)).await.unwrap();
    assert_eq!(data, b"DE");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("range.bin");
    let written = downloader
        .download_to_file(&file_id.hex(), Some(requested), &path)
        .await
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(std::fs::read(&path).unwrap(), b"DE");
}

/// The file layout used by the range tests: which chunk spans of which xorbs
/// make up the file, in order.
struct TestFile<'a> {
    layout: Vec<(&'a TestXorb, u32, u32)>,
}

impl<'a> TestFile<'a> {
    fn data(&self) -> Vec<u8> {
        self.layout.iter().flat_map(|(x, lo, hi)| x.unpacked_bytes(*lo, *hi)).collect()
    }

    /// Build the plan a CAS server would return for a byte range of this file,
    /// mounting the blob-store mocks the plan's fetch infos need.
    fn plan_for_range(&self, server: &'a MockServer, range: Option<FileRange>) -> QueryReconstructionResponse {
        let total_len: u64 = self.layout.iter().map(|(x, lo, hi)| x.unpacked_len(*lo, *hi) as u64).sum();
        let range = range.unwrap_or(FileRange::new(0, total_len));

        let mut terms = Vec::new();
        let mut fetch_info: HashMap<ContentHash, Vec<CASReconstructionFetchInfo>> = HashMap::new();
        let mut offset_into_first_range = 0;

        let mut cursor: u64 = 0;
        for (xorb, lo, hi) in &self.layout {
            let term_len = xorb.unpacked_len(*lo, *hi) as u64;
            let term_range = FileRange::new(cursor, cursor + term_len);
            cursor += term_len;

            if term_range.end <= range.start || term_range.start >= range.end {
                continue;
            }

            if terms.is_empty() {
                offset_into_first_range = range.start - term_range.start;
            }

            let (info, _) = mount_fetch(server, xorb, *lo, *hi);
            let entry = fetch_info.entry(xorb.hash).or_default();
            if !entry.contains(&info) {
                entry.push(info);
            }
            terms.push(term(xorb, *lo, *hi));
        }

        QueryReconstructionResponse {
            offset_into_first_range,
            terms,
            fetch_info,
        }
    }
}

#[tokio::test]
async fn test_range_slicing_matches_full_download() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let mut rng = rand::rngs::StdRng::seed_from_u64(23);
    let x1 = TestXorb::random("d1", &[400, 700, 300], &mut rng);
    let x2 = TestXorb::random("d2", &[550, 450], &mut rng);
    let x3 = TestXorb::random("d3", &[800, 200, 650], &mut rng);

    let file = TestFile {
        layout: vec![(&x1, 0, 3), (&x2, 0, 2), (&x3, 1, 3), (&x1, 1, 2)],
    };
    let full_data = file.data();
    let file_len = full_data.len() as u64;

    // Full download.
    let full_id = hash("e0");
    let plan = file.plan_for_range(&server, None);
    mount_plan(&server, &full_id, None, &plan);

    let downloader = downloader_for(&server);
    let downloaded = downloader.download(&full_id.hex(), None).await.unwrap();
    assert_eq!(downloaded, full_data);

    // Ranged downloads equal slices of the full download. Each range gets its
    // own file id so plan mocks cannot shadow one another.
    let ranges = [
        FileRange::new(0, file_len / 2),
        FileRange::new(file_len / 3, 2 * file_len / 3),
        FileRange::new(file_len - 7, file_len),
        FileRange::new(401, 402),
    ];

    for (i, range) in ranges.into_iter().enumerate() {
        let file_id = hash(&format!("e{}", i + 1));
        let plan = file.plan_for_range(&server, Some(range));
        mount_plan(&server, &file_id, Some(range), &plan);

        let data = downloader.download(&file_id.hex(), Some(range)).await.unwrap();
        assert_eq!(
            data,
            &full_data[range.start as usize..range.end as usize],
            "range {range:?} mismatch"
        );
    }
}

#[tokio::test]
async fn test_empty_range_makes_no_requests() {
    let server = MockServer::start_async().await;
    let token_mock = mount_token(&server);

    let downloader = downloader_for(&server);
    let file_id = hash("f4");

    let data = downloader
        .download(&file_id.hex(), Some(FileRange::new(5, 5)))
        .await
        .unwrap();
    assert!(data.is_empty());

    // File target: a zero-length file is created, still with no HTTP traffic.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.bin");
    let written = downloader
        .download_to_file(&file_id.hex(), Some(FileRange::new(9, 9)), &path)
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(std::fs::read(&path).unwrap(), b"");

    assert_eq!(token_mock.hits(), 0);
}

#[tokio::test]
async fn test_invalid_file_id_rejected_before_network() {
    let server = MockServer::start_async().await;
    let token_mock = mount_token(&server);
    let downloader = downloader_for(&server);

    let bad_ids = ["".to_string(), "xyz".to_string(), "A".repeat(64), "a".repeat(63)];
    for bad_id in &bad_ids {
        let err = downloader.download(bad_id, None).await.unwrap_err();
        assert!(matches!(err, CasClientError::InvalidFileId(_)), "{bad_id:?}: {err:?}");
    }

    // download_to_file must not create the destination for a bad id.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never.bin");
    let err = downloader.download_to_file("nope", None, &path).await.unwrap_err();
    assert!(matches!(err, CasClientError::InvalidFileId(_)), "{err:?}");
    assert!(!path.exists());

    assert_eq!(token_mock.hits(), 0);
}

#[tokio::test]
async fn test_insecure_cas_url_rejected() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    // Token acquisition itself is allowed, but the minted http:// CAS URL is
    // rejected in secure mode before the plan query goes out.
    let mut config = CasfetchConfig::default();
    config.client.allow_insecure_urls = false;
    let downloader = downloader_with_config(&server, config);

    let err = downloader.download(&hash("f5").hex(), None).await.unwrap_err();
    assert!(matches!(err, CasClientError::InsecureUrl(_)), "{err:?}");
}

#[tokio::test]
async fn test_out_of_order_fetch_completion_preserves_order() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let x1 = TestXorb::new("a1", vec![b"first part ".to_vec()]);
    let x2 = TestXorb::new("a2", vec![b"second part".to_vec()]);

    // The first xorb responds slowly; the second completes first.
    let (start, end) = x1.serialized.byte_span(0, 1);
    let url_range = HttpRange::new(start, end - 1);
    let body = x1.serialized.data.clone();
    server.mock(|when, then| {
        when.method(GET)
            .path(format!("/xorbs/{}", x1.hash))
            .header("range", url_range.range_header());
        then.status(206).body(&body).delay(Duration::from_millis(200));
    });
    let slow_fetch = CASReconstructionFetchInfo {
        url: server.url(format!("/xorbs/{}", x1.hash)),
        range: ChunkRange::new(0, 1),
        url_range,
    };
    let (fast_fetch, _) = mount_fetch(&server, &x2, 0, 1);

    let file_id = hash("f6");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&x1, 0, 1), term(&x2, 0, 1)],
        fetch_info: HashMap::from([(x1.hash, vec![slow_fetch]), (x2.hash, vec![fast_fetch])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);
    let data = downloader.download(&file_id.hex(), None).await.unwrap();
    assert_eq!(data, b"first part second part");
}

#[tokio::test]
async fn test_term_served_by_covering_fetch_info() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let mut rng = rand::rngs::StdRng::seed_from_u64(31);
    let xorb = TestXorb::random("ab", &[120, 240, 360, 480, 100, 90, 80, 70], &mut rng);

    // Two fetch infos; the term [4, 6) is contained only by the second.
    let (info_front, front_mock) = mount_fetch(&server, &xorb, 0, 4);
    let (info_back, back_mock) = mount_fetch(&server, &xorb, 4, 8);

    let file_id = hash("f7");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&xorb, 4, 6)],
        fetch_info: HashMap::from([(xorb.hash, vec![info_front, info_back])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);
    let data = downloader.download(&file_id.hex(), None).await.unwrap();
    assert_eq!(data, xorb.unpacked_bytes(4, 6));
    assert_eq!(front_mock.hits(), 0);
    assert_eq!(back_mock.hits(), 1);
}

#[tokio::test]
async fn test_missing_fetch_info_is_malformed_plan() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let xorb = TestXorb::new("ac", vec![b"data".to_vec()]);
    let file_id = hash("f8");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&xorb, 0, 1)],
        fetch_info: HashMap::new(),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);
    let err = downloader.download(&file_id.hex(), None).await.unwrap_err();
    assert!(matches!(err, CasClientError::MalformedReconstruction(_)), "{err:?}");
}

#[tokio::test]
async fn test_uncovered_term_range_is_malformed_plan() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let mut rng = rand::rngs::StdRng::seed_from_u64(37);
    let xorb = TestXorb::random("ad", &[100, 100, 100, 100], &mut rng);
    let (fetch_info, _) = mount_fetch(&server, &xorb, 0, 2);

    let file_id = hash("f9");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&xorb, 1, 4)],
        fetch_info: HashMap::from([(xorb.hash, vec![fetch_info])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);
    let err = downloader.download(&file_id.hex(), None).await.unwrap_err();
    assert!(matches!(err, CasClientError::MalformedReconstruction(_)), "{err:?}");
}

#[tokio::test]
async fn test_unpacked_length_mismatch_fails_download() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let xorb = TestXorb::new("ae", vec![b"ABCDE".to_vec(), b"FGHIJ".to_vec()]);
    let (fetch_info, _) = mount_fetch(&server, &xorb, 0, 2);

    // The fetch covers [0, 2) but the term only names [0, 1) and lies about
    // its unpacked length.
    let file_id = hash("fa");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![CASReconstructionTerm {
            hash: xorb.hash,
            unpacked_length: 7,
            range: ChunkRange::new(0, 1),
        }],
        fetch_info: HashMap::from([(xorb.hash, vec![fetch_info])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);
    let err = downloader.download(&file_id.hex(), None).await.unwrap_err();
    assert!(matches!(err, CasClientError::MalformedReconstruction(_)), "{err:?}");
}

#[tokio::test]
async fn test_reconstruction_error_status_propagates() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let file_id = hash("fb");
    server.mock(|when, then| {
        when.method(GET).path(format!("/v1/reconstructions/{file_id}"));
        then.status(500).body("server fell over");
    });

    let downloader = downloader_for(&server);
    let err = downloader.download(&file_id.hex(), None).await.unwrap_err();
    match err {
        CasClientError::ReconstructionFailed { status, body, .. } => {
            assert_eq!(status, 500);
            assert_eq!(body, "server fell over");
        },
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_zero_length_file() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let file_id = hash("fc");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![],
        fetch_info: HashMap::new(),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);
    let data = downloader.download(&file_id.hex(), None).await.unwrap();
    assert!(data.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zero.bin");
    let written = downloader.download_to_file(&file_id.hex(), None, &path).await.unwrap();
    assert_eq!(written, 0);
    assert!(path.exists());
}

#[tokio::test]
async fn test_concurrent_downloads_share_one_token_refresh() {
    let server = MockServer::start_async().await;
    let token_mock = mount_token(&server);

    let xorb = TestXorb::new("b0", vec![b"shared token payload".to_vec()]);
    let (fetch_info, _) = mount_fetch(&server, &xorb, 0, 1);

    let file_id = hash("fe");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&xorb, 0, 1)],
        fetch_info: HashMap::from([(xorb.hash, vec![fetch_info])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let downloader = downloader_for(&server);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..6 {
        let downloader = downloader.clone();
        let id = file_id.hex();
        tasks.spawn(async move { downloader.download(&id, None).await });
    }

    for result in tasks.join_all().await {
        assert_eq!(result.unwrap(), b"shared token payload");
    }

    // Six concurrent downloads with no cached token: exactly one refresh.
    assert_eq!(token_mock.hits(), 1);
}

#[tokio::test]
async fn test_download_to_file_truncates_existing() {
    let server = MockServer::start_async().await;
    mount_token(&server);

    let xorb = TestXorb::new("af", vec![b"short".to_vec()]);
    let (fetch_info, _) = mount_fetch(&server, &xorb, 0, 1);

    let file_id = hash("fd");
    let plan = QueryReconstructionResponse {
        offset_into_first_range: 0,
        terms: vec![term(&xorb, 0, 1)],
        fetch_info: HashMap::from([(xorb.hash, vec![fetch_info])]),
    };
    mount_plan(&server, &file_id, None, &plan);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bin");
    std::fs::write(&path, b"previous much longer contents").unwrap();

    let downloader = downloader_for(&server);
    downloader.download_to_file(&file_id.hex(), None, &path).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"short");
}
