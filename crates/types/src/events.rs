use event_bus::Event;
use serde::{Deserialize, Serialize};

use crate::peer::Peer;
use crate::session::SessionStats;

/// Lifecycle notifications the dispatcher publishes on the shared event bus.
/// Nothing downstream depends on these for correctness — the registry and
/// stores are updated synchronously by the dispatcher itself — but they give
/// the observability layer and the stats feed a decoupled way to react to
/// topology changes without reaching into dispatcher internals.
#[derive(Clone, Debug, Event)]
pub enum DispatcherEvent {
    PeerJoined { peer_key: String, model_name: String },
    PeerDisconnected { peer_key: String },
    VersionMismatch { peer_key_prefix: String, advertised: Option<String> },
    MatchmakingFailed { model_name: String },
    PeerUnhealthy { peer_key: String },
}

/// The JSON payload pushed by `GET /ws` on connect and every 5 seconds after.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub unique_peer_count: i64,
    pub active_peers: i64,
    pub active_models: Vec<String>,
    pub all_peers: Vec<Peer>,
    pub stats: SessionStats,
}
