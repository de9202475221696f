use async_trait::async_trait;
use hub_types::{NewPeer, Peer, PeerDirectoryEntry};

use crate::error::StoreResult;

/// Durable record of known providers, and the matchmaking query the
/// dispatcher runs against it.
#[async_trait]
pub trait PeerStore: Send + Sync {
    /// Insert or replace the row identified by `peer.key`. Preserves
    /// accumulated counters but resets `online = true` and refreshes
    /// `updated_at`.
    async fn upsert(&self, peer: &NewPeer) -> StoreResult<Peer>;

    /// Sets `online = false` for the given peer. A no-op if the peer is
    /// unknown.
    async fn set_offline(&self, key: &str) -> StoreResult<()>;

    /// Records the connection fan-out the provider last reported.
    async fn update_connections(&self, key: &str, connections: i64) -> StoreResult<()>;

    /// Records the outcome of the last health-check cycle. A no-op if the
    /// peer is unknown.
    async fn set_healthy(&self, key: &str, healthy: bool) -> StoreResult<()>;

    async fn get_by_key(&self, key: &str) -> StoreResult<Option<Peer>>;

    async fn get_by_discovery_key(&self, discovery_key: &str) -> StoreResult<Option<Peer>>;

    /// A uniformly random row among `online = true AND model_name = model`.
    /// Returns `None` if no peer currently matches.
    async fn get_random(&self, model_name: &str) -> StoreResult<Option<Peer>>;

    /// Sets `online = false AND connections = 0` for every row. Called once
    /// at startup so a restart never leaves stale "online" peers behind.
    async fn reset_all_connections(&self) -> StoreResult<()>;

    /// A joined read including session counts and metric aggregates, used by
    /// the stats page and the `GET /ws` snapshot.
    async fn get_all(&self) -> StoreResult<Vec<PeerDirectoryEntry>>;

    /// Hard delete. Returns whether a row was removed. Used by the admin CLI.
    async fn delete(&self, key: &str) -> StoreResult<bool>;
}
