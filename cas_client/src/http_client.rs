use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use casfetch_config::ClientConfig;
use http::{HeaderMap, HeaderValue};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use url::Url;

use crate::error::{CasClientError, Result};

pub const USER_AGENT_DEFAULT: &str = concat!("casfetch/", env!("CARGO_PKG_VERSION"));

const SESSION_ID_HEADER: &str = "x-session-id";

/// Build an HTTP client with the configured connect/read timeouts and per-host
/// connection pooling. A session id, when provided, is attached to every
/// request for server-side correlation.
pub fn build_http_client(config: &ClientConfig, session_id: &str, user_agent: &str) -> Result<ClientWithMiddleware> {
    let mut headers = HeaderMap::new();
    if !session_id.is_empty() {
        if let Ok(value) = HeaderValue::from_str(session_id) {
            headers.insert(SESSION_ID_HEADER, value);
        }
    }

    let user_agent = if user_agent.is_empty() { USER_AGENT_DEFAULT } else { user_agent };

    let client = reqwest::Client::builder()
        .connect_timeout(config.connect_timeout)
        .read_timeout(config.read_timeout)
        .pool_max_idle_per_host(config.connections_per_host)
        .user_agent(user_agent)
        .default_headers(headers)
        .build()?;

    Ok(ClientBuilder::new(client).build())
}

/// A fixed pool of HTTP clients, handed out round-robin. A single well-pooled
/// client is usually enough; more spread socket-level parallelism across
/// client instances when one connection pool becomes the bottleneck.
pub struct HttpClientPool {
    clients: Vec<Arc<ClientWithMiddleware>>,
    next: AtomicUsize,
}

impl HttpClientPool {
    pub fn new(config: &ClientConfig, session_id: &str, user_agent: &str) -> Result<Self> {
        let pool_size = config.pool_size.max(1);
        let clients = (0..pool_size)
            .map(|_| Ok(Arc::new(build_http_client(config, session_id, user_agent)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            clients,
            next: AtomicUsize::new(0),
        })
    }

    pub fn next_client(&self) -> Arc<ClientWithMiddleware> {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        self.clients[idx].clone()
    }

    pub fn size(&self) -> usize {
        self.clients.len()
    }
}

/// Parse a URL and enforce the HTTPS requirement. Non-HTTPS URLs are rejected
/// unless insecure mode is enabled.
pub fn parse_permitted_url(url: &str, allow_insecure: bool) -> Result<Url> {
    let parsed = Url::parse(url)?;
    if parsed.scheme() != "https" && !allow_insecure {
        let host = parsed.host_str().unwrap_or_default().to_string();
        return Err(CasClientError::InsecureUrl(host));
    }
    Ok(parsed)
}
