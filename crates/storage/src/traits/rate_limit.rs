use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreResult;

/// Fixed-window HTTP request counter keyed by client IP.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Upserts the row for `ip`: increments `message_count` and sets
    /// `last_seen = now`, initialising `first_seen` on first contact.
    /// Returns the counter's state *after* the increment.
    async fn record(&self, ip: &str) -> StoreResult<(i64, DateTime<Utc>)>;

    /// Reads the counter for `ip` without incrementing it. Returns `None` if
    /// the IP has never been seen, or if `last_seen` falls outside
    /// `window_minutes`.
    async fn get(&self, ip: &str, window_minutes: i64) -> StoreResult<Option<(i64, DateTime<Utc>)>>;
}
