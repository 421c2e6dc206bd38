use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cas_types::TokenResponse;
use casfetch_config::{CasfetchConfig, config};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use http::header::{AUTHORIZATION, CACHE_CONTROL};
use lazy_static::lazy_static;
use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, info};

use crate::error::{CasClientError, Result};
use crate::http_client::build_http_client;

/// Short-lived access credentials for the CAS service.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub cas_url: String,
    pub access_token: String,
    pub expires_at: SystemTime,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<ConnectionInfo>>>;

/// Caches CAS access credentials for one `(refresh_url, hub_token)` pair and
/// coalesces concurrent refreshes.
///
/// `connection_info` returns the cached entry while it remains valid past the
/// safety window. When stale, the first caller starts a refresh and every
/// concurrent caller awaits the same shared future, so N callers produce
/// exactly one refresh request and share a single error on failure.
pub struct TokenProvider {
    refresh_url: String,
    hub_token: Option<String>,
    client: ClientWithMiddleware,
    safety_window: Duration,
    state: Arc<RwLock<Option<ConnectionInfo>>>,
    in_flight: tokio::sync::Mutex<Option<RefreshFuture>>,
}

impl TokenProvider {
    pub fn new(refresh_url: &str, hub_token: Option<&str>, config: &CasfetchConfig) -> Result<Self> {
        Ok(Self {
            refresh_url: refresh_url.to_string(),
            hub_token: hub_token.map(str::to_string),
            client: build_http_client(&config.client, "", "")?,
            safety_window: config.token.safety_window,
            state: Arc::new(RwLock::new(None)),
            in_flight: tokio::sync::Mutex::new(None),
        })
    }

    /// Current credentials, refreshing first if the cached entry is stale.
    pub async fn connection_info(&self) -> Result<ConnectionInfo> {
        if let Some(info) = self.cached_fresh()? {
            return Ok(info);
        }

        let refresh = {
            let mut in_flight = self.in_flight.lock().await;

            // A refresh may have landed while we waited for the lock.
            if let Some(info) = self.cached_fresh()? {
                return Ok(info);
            }

            // Drop a resolved future left over from an earlier refresh cycle.
            if in_flight.as_ref().is_some_and(|f| f.peek().is_some()) {
                *in_flight = None;
            }

            match in_flight.as_ref() {
                Some(f) => f.clone(),
                None => {
                    debug!(refresh_url = %self.refresh_url, "Token stale; starting refresh");
                    let fut = refresh_task(
                        self.client.clone(),
                        self.refresh_url.clone(),
                        self.hub_token.clone(),
                        self.state.clone(),
                    )
                    .boxed()
                    .shared();
                    *in_flight = Some(fut.clone());
                    fut
                },
            }
        };

        let result = refresh.await;

        // Clear the resolved future so the next stale read starts a new cycle.
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.as_ref().is_some_and(|f| f.peek().is_some()) {
            *in_flight = None;
        }

        result
    }

    fn cached_fresh(&self) -> Result<Option<ConnectionInfo>> {
        let deadline = SystemTime::now() + self.safety_window;
        let guard = self.state.read()?;
        Ok(guard.as_ref().filter(|info| info.expires_at > deadline).cloned())
    }
}

/// The refresh itself, detached from `&self` so it can live in a shared
/// 'static future. Publishes the new credentials before resolving.
async fn refresh_task(
    client: ClientWithMiddleware,
    refresh_url: String,
    hub_token: Option<String>,
    state: Arc<RwLock<Option<ConnectionInfo>>>,
) -> Result<ConnectionInfo> {
    let mut request = client.get(&refresh_url).header(CACHE_CONTROL, "no-cache");
    if let Some(token) = &hub_token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CasClientError::TokenRefreshFailed {
            status: status.as_u16(),
            body,
        });
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| CasClientError::MalformedTokenResponse(e.to_string()))?;

    let info = ConnectionInfo {
        cas_url: token.cas_url,
        access_token: token.access_token,
        expires_at: UNIX_EPOCH + Duration::from_secs(token.exp),
    };

    info!(cas_url = %info.cas_url, exp = token.exp, "Token refresh complete");

    *state.write()? = Some(info.clone());
    Ok(info)
}

lazy_static! {
    static ref PROVIDER_REGISTRY: Mutex<HashMap<(String, Option<String>), Arc<TokenProvider>>> =
        Mutex::new(HashMap::new());
}

/// The process-wide provider for a `(refresh_url, hub_token)` pair. Tokens
/// outlive individual downloads; all downloads against the same pair share one
/// cache.
pub fn shared_token_provider(refresh_url: &str, hub_token: Option<&str>) -> Result<Arc<TokenProvider>> {
    let key = (refresh_url.to_string(), hub_token.map(str::to_string));
    let mut registry = PROVIDER_REGISTRY.lock()?;

    if let Some(provider) = registry.get(&key) {
        return Ok(provider.clone());
    }

    let provider = Arc::new(TokenProvider::new(refresh_url, hub_token, config())?);
    registry.insert(key, provider.clone());
    Ok(provider)
}
