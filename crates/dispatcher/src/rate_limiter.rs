use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use hub_types::{PEER_MESSAGE_RATE_LIMIT, PEER_MESSAGE_RATE_WINDOW_SECS};

/// Caps frames from a single peer at [`PEER_MESSAGE_RATE_LIMIT`] per
/// [`PEER_MESSAGE_RATE_WINDOW_SECS`]. Each peer's counter expires (and
/// implicitly resets) after the window elapses since it was first touched.
pub struct PeerRateLimiter {
    counters: Cache<String, Arc<AtomicU32>>,
}

impl PeerRateLimiter {
    pub fn new() -> Self {
        let counters = Cache::builder()
            .time_to_live(Duration::from_secs(PEER_MESSAGE_RATE_WINDOW_SECS))
            .build();
        Self { counters }
    }

    /// Returns `true` if this frame is within the peer's current-window
    /// budget. Excess frames return `false`; the caller drops them and logs
    /// at `warn`.
    pub async fn allow(&self, peer_key: &str) -> bool {
        let counter = self
            .counters
            .get_with(peer_key.to_string(), async { Arc::new(AtomicU32::new(0)) })
            .await;

        let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
        count <= PEER_MESSAGE_RATE_LIMIT
    }
}

impl Default for PeerRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_exactly_the_limit_then_drops() {
        let limiter = PeerRateLimiter::new();

        for _ in 0..PEER_MESSAGE_RATE_LIMIT {
            assert!(limiter.allow("peer-a").await);
        }
        assert!(!limiter.allow("peer-a").await);
    }

    #[tokio::test]
    async fn peers_have_independent_budgets() {
        let limiter = PeerRateLimiter::new();
        for _ in 0..PEER_MESSAGE_RATE_LIMIT {
            assert!(limiter.allow("peer-a").await);
        }
        assert!(limiter.allow("peer-b").await);
    }
}
