use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_MAX_CONNECTIONS_PER_HOST: usize = 3;

/// Caps simultaneous requests per host. A permit is held for the lifetime
/// of one outbound request.
#[derive(Debug)]
pub struct ConnectionLimiter {
    per_host: usize,
    hosts: DashMap<String, Arc<Semaphore>>,
}

impl Default for ConnectionLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS_PER_HOST)
    }
}

impl ConnectionLimiter {
    pub fn new(per_host: usize) -> Self {
        ConnectionLimiter {
            per_host: per_host.max(1),
            hosts: DashMap::new(),
        }
    }

    pub fn per_host(&self) -> usize {
        self.per_host
    }

    /// Wait for a free connection slot on `host`. `None` only if the host's
    /// semaphore was closed, which this type never does.
    pub async fn acquire(&self, host: &str) -> Option<OwnedSemaphorePermit> {
        // Clone the entry out so the map shard is not locked while waiting.
        let semaphore = self
            .hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host)))
            .value()
            .clone();
        semaphore.acquire_owned().await.ok()
    }

    /// Free slots on `host` right now.
    pub fn available(&self, host: &str) -> usize {
        self.hosts
            .get(host)
            .map_or(self.per_host, |s| s.available_permits())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn holds_each_host_to_the_cap() {
        let limiter = Arc::new(ConnectionLimiter::new(3));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _permit = limiter.acquire("jobs.test").await;
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.available("jobs.test"), 3);
    }

    #[tokio::test]
    async fn hosts_do_not_share_slots() {
        let limiter = ConnectionLimiter::new(1);
        let _a = limiter.acquire("a.test").await;
        assert_eq!(limiter.available("a.test"), 0);
        assert_eq!(limiter.available("b.test"), 1);
        let _b = limiter.acquire("b.test").await;
        assert_eq!(limiter.available("b.test"), 0);
    }

    #[test]
    fn zero_cap_still_allows_one_connection() {
        assert_eq!(ConnectionLimiter::new(0).per_host(), 1);
    }
}
