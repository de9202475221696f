use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A broker session: a short-lived bearer token binding a consumer to a
/// chosen provider's discovery key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSession {
    pub id: String,
    pub provider_discovery_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One continuous peer connection's accounting record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSession {
    pub id: i64,
    pub peer_key: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub total_requests: i64,
}

/// A completion metrics checkpoint reported by a provider over `sendMetrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub id: i64,
    pub session_id: i64,
    pub tokens_per_second: f64,
    pub total_tokens: i64,
    pub duration_ms: i64,
    pub model_name: String,
    pub reported_at: DateTime<Utc>,
}

/// Inbound shape of a `sendMetrics` frame payload, before it is stamped with
/// an id and a session id and persisted as a [`MetricsRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub tokens_per_second: f64,
    pub total_tokens: i64,
    pub duration_ms: i64,
    pub model_name: String,
}

/// Aggregate totals served by `GET /ws` and the admin stats view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_sessions: i64,
    pub active_sessions: i64,
    pub total_requests: i64,
    pub requests_today: i64,
    pub average_duration_minutes: f64,
    pub total_duration_minutes: i64,
}

/// A fixed-window HTTP rate-limit counter row, keyed by client IP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IpMessageRow {
    pub ip_address: String,
    pub message_count: i64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}
