// Scraping engine: proxy pool, per-host connection cap, per-domain rate
// limiting, resilient fetching, selector-driven extraction and the
// bounded-concurrency orchestrator.

pub mod connection_limiter;
pub mod extract;
pub mod fetch;
pub mod orchestrator;
pub mod proxy_pool;
pub mod rate_limiter;
pub mod retry;
pub mod salary;

use std::time::Duration;

pub use connection_limiter::ConnectionLimiter;
pub use extract::Extractor;
pub use fetch::{FetchEngine, FetchRequest, PageFetcher, RawPage};
pub use orchestrator::{Orchestrator, ScrapeResults, scrape_all};
pub use proxy_pool::ProxyPool;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use salary::parse_salary;

pub const DEFAULT_CONCURRENCY: usize = 3;

/// Engine tunables. `Default` matches the documented production values.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Simultaneous requests allowed to one host.
    pub max_connections_per_host: usize,
    pub proxy_rotation_interval: Duration,
    pub description_limit: usize,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        ScraperConfig {
            concurrency: DEFAULT_CONCURRENCY,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_connections_per_host: connection_limiter::DEFAULT_MAX_CONNECTIONS_PER_HOST,
            proxy_rotation_interval: proxy_pool::DEFAULT_ROTATION_INTERVAL,
            description_limit: extract::DEFAULT_DESCRIPTION_LIMIT,
        }
    }
}
