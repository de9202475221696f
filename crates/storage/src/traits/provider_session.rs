use async_trait::async_trait;
use hub_types::{MetricsReport, SessionStats};

use crate::error::StoreResult;

/// Per-connection session lifecycle, request counts and token metrics. The
/// dispatcher calls [`ProviderSessionStore::start`] once per peer
/// connection, not once per request.
#[async_trait]
pub trait ProviderSessionStore: Send + Sync {
    /// Opens a new session row for `peer_key`. Enforced by a partial unique
    /// index: at most one open (`end_time IS NULL`) row per peer key may
    /// exist at a time, so callers must `end` any prior session first.
    async fn start(&self, peer_key: &str) -> StoreResult<i64>;

    /// Sets `duration_minutes` on the open row to the integer minutes
    /// elapsed since `start_time`.
    async fn update_duration(&self, peer_key: &str) -> StoreResult<()>;

    /// Closes the single open row for `peer_key`, if any.
    async fn end(&self, peer_key: &str) -> StoreResult<()>;

    /// Closes every row still open. Called once at startup.
    async fn end_orphans(&self) -> StoreResult<()>;

    async fn active_session_id(&self, peer_key: &str) -> StoreResult<Option<i64>>;

    /// Appends a metrics row referencing `session_id`.
    async fn add_metrics(&self, session_id: i64, report: &MetricsReport) -> StoreResult<()>;

    /// Increments `total_requests` on the session.
    async fn log_request(&self, session_id: i64) -> StoreResult<()>;

    /// Aggregate totals for the stats page and `GET /ws`.
    async fn stats(&self) -> StoreResult<SessionStats>;
}
