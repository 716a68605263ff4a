use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, HeaderMap, HeaderName, HeaderValue,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, FetchError};
use crate::models::ProxyEndpoint;
use crate::scraper::ScraperConfig;
use crate::scraper::connection_limiter::ConnectionLimiter;
use crate::scraper::proxy_pool::{ProxyPool, SelectedProxy};
use crate::scraper::rate_limiter::RateLimiter;
use crate::scraper::retry::{AttemptOutcome, RetryPolicy, RetryState};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// A fetched page and the status that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    pub domain: &'a str,
    pub min_delay: Duration,
}

/// Anything that can turn a URL into a page. The orchestrator only sees this.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<RawPage, FetchError>;
}

/// One outbound GET, fully prepared.
#[derive(Debug)]
pub struct OutboundRequest<'a> {
    pub url: &'a str,
    pub headers: HeaderMap,
    pub proxy: Option<&'a SelectedProxy>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Single-shot HTTP layer under the fetch engine. Errors must be
/// `FetchError::Timeout` or `FetchError::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: OutboundRequest<'_>) -> Result<TransportResponse, FetchError>;
}

/// reqwest-backed transport. Proxies are fixed per client in reqwest, so one
/// client is built per configured proxy plus one for direct connections.
pub struct ReqwestTransport {
    direct: reqwest::Client,
    proxied: Vec<reqwest::Client>,
}

impl ReqwestTransport {
    pub fn new(config: &ScraperConfig, proxies: &[ProxyEndpoint]) -> Result<Self, ConfigError> {
        let direct = client_builder(config)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let proxied = proxies
            .iter()
            .enumerate()
            .map(|(index, endpoint)| {
                let invalid = |reason: String| ConfigError::InvalidProxy {
                    index,
                    url: endpoint.redacted(),
                    reason,
                };
                let proxy = reqwest::Proxy::all(endpoint.url()).map_err(|e| invalid(e.to_string()))?;
                client_builder(config)
                    .proxy(proxy)
                    .build()
                    .map_err(|e| invalid(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReqwestTransport { direct, proxied })
    }
}

fn client_builder(config: &ScraperConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .connect_timeout(config.connect_timeout)
        .pool_max_idle_per_host(config.max_connections_per_host)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: OutboundRequest<'_>) -> Result<TransportResponse, FetchError> {
        let client = request
            .proxy
            .and_then(|p| self.proxied.get(p.index))
            .unwrap_or(&self.direct);

        let resp = client
            .get(request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Ok(TransportResponse {
                status,
                body: String::new(),
            });
        }

        let body = resp.text().await.map_err(classify_reqwest_error)?;
        Ok(TransportResponse { status, body })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(e.to_string())
    }
}

/// Browser-like header set with a user agent drawn from a fixed pool.
pub fn browser_headers() -> HeaderMap {
    let agent = USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(USER_AGENTS[0]);

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(agent));
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));
    headers.insert(HeaderName::from_static("dnt"), HeaderValue::from_static("1"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers
}

/// Resilient fetcher: per-host connection cap, rate-limit wait, proxy
/// selection, header rotation and bounded retry with exponential backoff
/// around a `Transport`.
pub struct FetchEngine<T = ReqwestTransport> {
    transport: T,
    proxies: Option<Arc<ProxyPool>>,
    rate_limiter: Arc<RateLimiter>,
    connections: Arc<ConnectionLimiter>,
    policy: RetryPolicy,
}

impl FetchEngine<ReqwestTransport> {
    /// Engine over reqwest, with a proxy pool when any proxies are configured.
    pub fn from_config(config: &ScraperConfig, proxies: Vec<ProxyEndpoint>) -> Result<Self, ConfigError> {
        let transport = ReqwestTransport::new(config, &proxies)?;
        let pool = (!proxies.is_empty()).then(|| {
            Arc::new(ProxyPool::with_rotation_interval(
                proxies,
                config.proxy_rotation_interval,
            ))
        });
        let connections = Arc::new(ConnectionLimiter::new(config.max_connections_per_host));
        Ok(FetchEngine::new(transport, pool, Arc::new(RateLimiter::new()), config.retry)
            .with_connection_limiter(connections))
    }
}

impl<T: Transport> FetchEngine<T> {
    pub fn new(
        transport: T,
        proxies: Option<Arc<ProxyPool>>,
        rate_limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Self {
        FetchEngine {
            transport,
            proxies,
            rate_limiter,
            connections: Arc::new(ConnectionLimiter::default()),
            policy,
        }
    }

    /// Share a connection cap with other engines, or replace the default one.
    pub fn with_connection_limiter(mut self, connections: Arc<ConnectionLimiter>) -> Self {
        self.connections = connections;
        self
    }

    pub fn proxy_pool(&self) -> Option<&Arc<ProxyPool>> {
        self.proxies.as_ref()
    }

    /// One GET, after the rate-limit wait has been served.
    async fn attempt(&self, request: &FetchRequest<'_>, attempt: u32) -> Result<RawPage, FetchError> {
        let proxy = self.proxies.as_ref().and_then(|pool| pool.next());
        let outbound = OutboundRequest {
            url: request.url,
            headers: browser_headers(),
            proxy: proxy.as_ref(),
        };

        match self.transport.send(outbound).await {
            Ok(resp) if (200..300).contains(&resp.status) => {
                tracing::info!(url = request.url, status = resp.status, "Successfully fetched");
                Ok(RawPage {
                    url: request.url.to_string(),
                    status: resp.status,
                    body: resp.body,
                })
            }
            Ok(resp) if resp.status == 429 => {
                tracing::warn!(url = request.url, attempt = attempt + 1, "Rate limited");
                Err(FetchError::RateLimited)
            }
            Ok(resp) => {
                tracing::warn!(url = request.url, attempt = attempt + 1, "HTTP {}", resp.status);
                Err(FetchError::Status(resp.status))
            }
            Err(e) => {
                tracing::warn!(url = request.url, attempt = attempt + 1, "Fetch failed: {e}");
                if let (Some(pool), Some(selected)) = (&self.proxies, &proxy) {
                    pool.mark_failed(selected.index);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<T: Transport> PageFetcher for FetchEngine<T> {
    async fn fetch(
        &self,
        request: &FetchRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<RawPage, FetchError> {
        let mut state = RetryState::start();
        let mut last_error = FetchError::Transport("no attempt made".to_string());
        let mut page = None;

        loop {
            state = match state {
                RetryState::Attempting(attempt) => {
                    // Slot first, so the rate-limit timestamp is taken right
                    // before the request actually goes out.
                    let slot = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        slot = async {
                            let slot = self.connections.acquire(request.domain).await;
                            self.rate_limiter
                                .wait_if_needed(request.domain, request.min_delay)
                                .await;
                            slot
                        } => slot,
                    };
                    // Not raced: a request already on the wire is allowed to finish.
                    let result = self.attempt(request, attempt).await;
                    drop(slot);
                    let outcome = match result {
                        Ok(fetched) => {
                            page = Some(fetched);
                            AttemptOutcome::Success
                        }
                        Err(e) => {
                            let outcome = if e == FetchError::RateLimited {
                                AttemptOutcome::RateLimited
                            } else {
                                AttemptOutcome::Failed
                            };
                            last_error = e;
                            outcome
                        }
                    };
                    state.on_outcome(outcome, &self.policy)
                }
                RetryState::BackingOff { delay, .. } => {
                    tracing::debug!(url = request.url, delay_secs = delay.as_secs_f64(), "Backing off");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    state.resume()
                }
                RetryState::Succeeded => {
                    return page.ok_or_else(|| FetchError::Transport("missing page".to_string()));
                }
                RetryState::Exhausted { attempts } => {
                    tracing::warn!(url = request.url, attempts, "Giving up: {last_error}");
                    return Err(FetchError::Exhausted {
                        attempts,
                        last: Box::new(last_error),
                    });
                }
            };
        }
    }
}
