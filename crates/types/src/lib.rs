pub mod config;
pub mod events;
pub mod frame;
pub mod peer;
pub mod session;

pub use config::HubConfig;
pub use events::{DispatcherEvent, StatsSnapshot};
pub use frame::{Frame, FrameError};
pub use peer::{NewPeer, Peer, PeerDirectoryEntry};
pub use session::{BrokerSession, IpMessageRow, MetricsRecord, ProviderSession, SessionStats};

/// Length, in hex characters, of a peer's public key.
pub const PEER_KEY_HEX_LEN: usize = 64;

/// Default lifetime of a broker session.
pub const BROKER_SESSION_TTL_SECS: i64 = 10 * 60;

/// Per-peer health-check cadence.
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 15 * 60;

/// How long the hub waits for a `healthCheck` ack before marking a peer unhealthy.
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 15;

/// Cadence at which `duration_minutes` is refreshed on the open provider session.
pub const SESSION_DURATION_TICK_SECS: u64 = 5 * 60;

/// Per-peer frame rate limit.
pub const PEER_MESSAGE_RATE_LIMIT: u32 = 500;

/// Window over which the per-peer frame rate limit is enforced.
pub const PEER_MESSAGE_RATE_WINDOW_SECS: u64 = 60;

/// HTTP rate limit window, in minutes.
pub const HTTP_RATE_LIMIT_WINDOW_MINUTES: i64 = 60;

/// Max HTTP requests allowed per IP per window.
pub const MAX_HTTP_REQUESTS: i64 = 100;

/// Bound on matchmaking retries when the peer store returns no candidate.
pub const MATCHMAKING_MAX_ATTEMPTS: u32 = 5;
