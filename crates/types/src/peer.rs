use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provider peer, as stored by the peer store.
///
/// `key` is the hex-encoded remote public key and is the row's natural
/// identity; `discovery_key` is a second, independently-unique handle used to
/// bind broker sessions without round-tripping the raw public key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub key: String,
    pub discovery_key: String,
    pub model_name: String,
    pub api_provider: Option<String>,
    pub name: Option<String>,
    pub website: Option<String>,
    pub public: bool,
    pub data_collection_enabled: bool,
    pub server_key: Option<String>,
    pub max_connections: i64,
    pub connections: i64,
    pub online: bool,
    pub healthy: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by a `join` frame; everything else is computed by the store
/// on upsert (timestamps, `online`, preserved counters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPeer {
    pub key: String,
    pub discovery_key: String,
    pub model_name: String,
    pub api_provider: Option<String>,
    pub name: Option<String>,
    pub website: Option<String>,
    pub public: bool,
    pub data_collection_enabled: bool,
    pub server_key: Option<String>,
    pub max_connections: i64,
}

/// A row as returned by the joined `get_all` read used by the stats page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerDirectoryEntry {
    pub peer: Peer,
    pub total_sessions: i64,
    pub total_requests: i64,
}
