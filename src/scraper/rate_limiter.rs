use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum delay between successive requests to the same domain.
///
/// Each domain gets its own async mutex, so a caller sleeping for one domain
/// never holds up another. Callers for the same domain queue on that mutex
/// and are released one `min_delay` apart.
#[derive(Debug, Default)]
pub struct RateLimiter {
    domains: DashMap<String, Arc<Mutex<Option<Instant>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep until at least `min_delay` has passed since the last request to
    /// `domain`, then record now as the last request time.
    pub async fn wait_if_needed(&self, domain: &str, min_delay: Duration) {
        // Clone the entry out so the map shard is not locked while sleeping.
        let entry = self
            .domains
            .entry(domain.to_string())
            .or_default()
            .value()
            .clone();

        let mut last = entry.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min_delay {
                let wait = min_delay - elapsed;
                tracing::debug!(domain, wait_secs = wait.as_secs_f64(), "Rate limiting");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Last recorded request time for `domain`, if any.
    pub async fn last_request(&self, domain: &str) -> Option<Instant> {
        let entry = self.domains.get(domain).map(|e| e.value().clone())?;
        let last = *entry.lock().await;
        last
    }
}
