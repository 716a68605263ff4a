use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::seq::IteratorRandom;
use tokio::time::Instant;

use crate::models::ProxyEndpoint;

pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_secs(300);

/// A proxy handed out for one request, tagged with its pool index so a
/// failure can be reported against exactly the proxy that was used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedProxy {
    pub index: usize,
    pub endpoint: ProxyEndpoint,
}

#[derive(Debug)]
struct PoolState {
    active: BTreeSet<usize>,
    failed: BTreeSet<usize>,
    current: Option<usize>,
    last_rotation: Option<Instant>,
}

/// Shared proxy pool. Every read and mutation goes through one mutex; no
/// lock is ever held across an await.
#[derive(Debug)]
pub struct ProxyPool {
    endpoints: Vec<ProxyEndpoint>,
    rotation_interval: Duration,
    state: Mutex<PoolState>,
}

impl ProxyPool {
    pub fn new(endpoints: Vec<ProxyEndpoint>) -> Self {
        Self::with_rotation_interval(endpoints, DEFAULT_ROTATION_INTERVAL)
    }

    pub fn with_rotation_interval(endpoints: Vec<ProxyEndpoint>, rotation_interval: Duration) -> Self {
        let state = PoolState {
            active: (0..endpoints.len()).collect(),
            failed: BTreeSet::new(),
            current: None,
            last_rotation: None,
        };
        ProxyPool {
            endpoints,
            rotation_interval,
            state: Mutex::new(state),
        }
    }

    /// The proxy for the next request, or `None` when no proxy is active.
    ///
    /// Sticky: the same proxy is returned until the rotation interval has
    /// elapsed or that proxy has been marked failed, at which point a new one
    /// is drawn uniformly from the active set.
    pub fn next(&self) -> Option<SelectedProxy> {
        let mut state = self.lock();
        if state.active.is_empty() {
            tracing::warn!("No active proxies available, connecting directly");
            return None;
        }

        let now = Instant::now();
        let expired = state
            .last_rotation
            .is_none_or(|at| now.duration_since(at) > self.rotation_interval);
        let current_failed = state.current.is_none_or(|i| !state.active.contains(&i));

        if expired || current_failed {
            let choice = state.active.iter().copied().choose(&mut rand::rng());
            state.current = choice;
            state.last_rotation = Some(now);
            if let Some(index) = choice {
                tracing::debug!(index, "Rotated to proxy {}", self.endpoints[index].redacted());
            }
        }

        state.current.map(|index| SelectedProxy {
            index,
            endpoint: self.endpoints[index].clone(),
        })
    }

    /// Move `index` from active to failed. Idempotent; unknown indices are ignored.
    pub fn mark_failed(&self, index: usize) {
        let mut state = self.lock();
        if state.active.remove(&index) {
            state.failed.insert(index);
            tracing::warn!(
                index,
                remaining = state.active.len(),
                "Proxy {} marked as failed",
                self.endpoints[index].redacted()
            );
        }
    }

    /// Return every failed proxy to the active set.
    pub fn reset_failed(&self) {
        let mut state = self.lock();
        let restored = state.failed.len();
        let failed = std::mem::take(&mut state.failed);
        state.active.extend(failed);
        tracing::info!(restored, "Reset all failed proxies");
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    pub fn failed_indices(&self) -> Vec<usize> {
        self.lock().failed.iter().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // State stays consistent even if a holder panicked: every mutation
        // is a single set move.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(n: usize) -> Vec<ProxyEndpoint> {
        (0..n)
            .map(|i| ProxyEndpoint {
                host: format!("10.0.0.{i}"),
                port: 8080,
                username: None,
                password: None,
                protocol: "http".to_string(),
            })
            .collect()
    }

    #[test]
    fn empty_pool_yields_none() {
        let pool = ProxyPool::new(Vec::new());
        assert!(pool.next().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn selection_is_sticky_within_interval() {
        let pool = ProxyPool::new(endpoints(5));
        let first = pool.next().unwrap();
        for _ in 0..20 {
            assert_eq!(pool.next().unwrap().index, first.index);
        }
        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(pool.next().unwrap().index, first.index);
    }

    #[tokio::test(start_paused = true)]
    async fn rotates_after_interval() {
        let pool = ProxyPool::with_rotation_interval(endpoints(1), Duration::from_secs(10));
        pool.next().unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        // Single proxy: rotation redraws the same index but must still succeed.
        assert_eq!(pool.next().unwrap().index, 0);
    }

    #[test]
    fn failed_proxy_is_never_returned_until_reset() {
        let pool = ProxyPool::new(endpoints(4));
        let failed = pool.next().unwrap().index;
        pool.mark_failed(failed);
        pool.mark_failed(failed);
        assert_eq!(pool.active_count(), 3);
        assert_eq!(pool.failed_indices(), vec![failed]);

        for _ in 0..200 {
            assert_ne!(pool.next().unwrap().index, failed);
        }

        pool.reset_failed();
        assert_eq!(pool.active_count(), 4);
        assert!(pool.failed_indices().is_empty());
    }

    #[test]
    fn exhausted_pool_falls_back_to_direct() {
        let pool = ProxyPool::new(endpoints(2));
        pool.mark_failed(0);
        pool.mark_failed(1);
        assert!(pool.next().is_none());
        pool.reset_failed();
        assert!(pool.next().is_some());
    }

    #[test]
    fn active_and_failed_partition_the_pool() {
        let pool = ProxyPool::new(endpoints(6));
        pool.mark_failed(1);
        pool.mark_failed(4);
        pool.mark_failed(42);
        let state = pool.lock();
        assert!(state.active.is_disjoint(&state.failed));
        assert_eq!(state.active.len() + state.failed.len(), 6);
    }
}
