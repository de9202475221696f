//! The peer wire protocol: a JSON envelope `{"key": ..., "data": ...}` carried
//! over a length-delimited stream. See [`Frame`] for the exhaustive set of
//! keys the dispatcher understands; anything else decodes to
//! [`Frame::Unknown`] rather than failing, matching the protocol's
//! tolerance of messages from peers running a newer or older build.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    NotJson(#[source] serde_json::Error),
    #[error("frame envelope is missing `key` or `data`")]
    MalformedEnvelope,
    #[error("invalid payload for frame `{key}`: {source}")]
    InvalidPayload {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The raw `{"key": ..., "data": ...}` shape every frame takes on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    key: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    /// Hex-encoded long-term public key identifying this peer. In the real
    /// overlay this is established by the encrypted transport handshake
    /// before `join` is even read; this stand-in transport has the peer
    /// self-report it here instead.
    pub public_key: String,
    pub discovery_key: String,
    pub model_name: String,
    pub max_connections: i64,
    #[serde(default)]
    pub api_provider: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub data_collection_enabled: bool,
    #[serde(default)]
    pub server_key: Option<String>,
    #[serde(default)]
    pub symmetry_core_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAckPayload {
    pub status: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMismatchPayload {
    pub min_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengePayload {
    pub challenge: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeSignedPayload {
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSizePayload {
    pub connections: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestProviderPayload {
    pub model_name: String,
    #[serde(default)]
    pub preferred_provider_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDetailsPayload {
    pub provider_id: String,
    pub session_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValidPayload {
    pub discovery_key: String,
    pub model_name: String,
    pub name: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferencePayload {
    pub messages: Vec<ChatMessage>,
    pub key: String,
}

pub use crate::session::MetricsReport as SendMetricsPayload;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckPayload {
    pub request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckFailedPayload {
    pub request_id: String,
}

/// One frame of the peer wire protocol, decoded from (or destined for) the
/// `{"key", "data"}` envelope. [`Frame::Unknown`] absorbs any key the
/// dispatcher doesn't recognise instead of failing decode.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Join(JoinPayload),
    JoinAck(JoinAckPayload),
    VersionMismatch(VersionMismatchPayload),
    Challenge(ChallengePayload),
    ChallengeSigned(ChallengeSignedPayload),
    ConnectionSize(ConnectionSizePayload),
    RequestProvider(RequestProviderPayload),
    ProviderDetails(ProviderDetailsPayload),
    VerifySession(String),
    SessionValid(SessionValidPayload),
    Inference(InferencePayload),
    SendMetrics(SendMetricsPayload),
    HealthCheck(HealthCheckPayload),
    HealthCheckFailed(HealthCheckFailedPayload),
    InferenceEnded,
    Unknown(String),
}

impl Frame {
    /// Decode one frame from a JSON byte slice. Unknown `key`s decode
    /// successfully to [`Frame::Unknown`]; only malformed JSON or a
    /// recognised key with the wrong payload shape is an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let envelope: Envelope = serde_json::from_slice(bytes).map_err(FrameError::NotJson)?;
        Self::from_envelope(envelope)
    }

    fn from_envelope(envelope: Envelope) -> Result<Self, FrameError> {
        macro_rules! payload {
            ($key:literal, $variant:ident) => {{
                let payload = serde_json::from_value(envelope.data).map_err(|source| {
                    FrameError::InvalidPayload {
                        key: $key,
                        source,
                    }
                })?;
                Ok(Frame::$variant(payload))
            }};
        }

        match envelope.key.as_str() {
            "join" => payload!("join", Join),
            "joinAck" => payload!("joinAck", JoinAck),
            "versionMismatch" => payload!("versionMismatch", VersionMismatch),
            "challenge" => payload!("challenge", Challenge),
            "conectionSize" => payload!("conectionSize", ConnectionSize),
            "requestProvider" => payload!("requestProvider", RequestProvider),
            "providerDetails" => payload!("providerDetails", ProviderDetails),
            "verifySession" => {
                let token: String = serde_json::from_value(envelope.data).map_err(|source| {
                    FrameError::InvalidPayload {
                        key: "verifySession",
                        source,
                    }
                })?;
                Ok(Frame::VerifySession(token))
            }
            "sessionValid" => payload!("sessionValid", SessionValid),
            "inference" => payload!("inference", Inference),
            "sendMetrics" => payload!("sendMetrics", SendMetrics),
            "healthCheck" => Ok(Frame::HealthCheck(
                serde_json::from_value(envelope.data).unwrap_or_default(),
            )),
            "healthCheckFailed" => Ok(Frame::HealthCheckFailed(
                serde_json::from_value(envelope.data).unwrap_or_default(),
            )),
            "inferenceEnded" => Ok(Frame::InferenceEnded),
            other => Ok(Frame::Unknown(other.to_string())),
        }
    }

    /// Encode this frame back into its wire envelope.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        let envelope = match self {
            Frame::Join(p) => Envelope {
                key: "join".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::JoinAck(p) => Envelope {
                key: "joinAck".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::VersionMismatch(p) => Envelope {
                key: "versionMismatch".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::Challenge(p) => Envelope {
                key: "challenge".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::ChallengeSigned(p) => Envelope {
                key: "challenge".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::ConnectionSize(p) => Envelope {
                key: "conectionSize".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::RequestProvider(p) => Envelope {
                key: "requestProvider".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::ProviderDetails(p) => Envelope {
                key: "providerDetails".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::VerifySession(token) => Envelope {
                key: "verifySession".into(),
                data: serde_json::to_value(token)?,
            },
            Frame::SessionValid(p) => Envelope {
                key: "sessionValid".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::Inference(p) => Envelope {
                key: "inference".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::SendMetrics(p) => Envelope {
                key: "sendMetrics".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::HealthCheck(p) => Envelope {
                key: "healthCheck".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::HealthCheckFailed(p) => Envelope {
                key: "healthCheckFailed".into(),
                data: serde_json::to_value(p)?,
            },
            Frame::InferenceEnded => Envelope {
                key: "inferenceEnded".into(),
                data: Value::Null,
            },
            Frame::Unknown(key) => Envelope {
                key: key.clone(),
                data: Value::Null,
            },
        };

        serde_json::to_vec(&envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_round_trips() {
        let frame = Frame::Join(JoinPayload {
            public_key: "a".repeat(64),
            discovery_key: "DDDD".into(),
            model_name: "llama3".into(),
            max_connections: 4,
            api_provider: None,
            name: None,
            website: None,
            public: true,
            data_collection_enabled: false,
            server_key: None,
            symmetry_core_version: Some("1.2.3".into()),
        });

        let bytes = frame.encode().expect("encode");
        let decoded = Frame::decode(&bytes).expect("decode");
        assert_eq!(frame, decoded);
    }

    #[test]
    fn unknown_key_does_not_fail_decode() {
        let decoded = Frame::decode(br#"{"key":"somethingNew","data":{"x":1}}"#)
            .expect("unknown keys decode to Frame::Unknown");
        assert_eq!(decoded, Frame::Unknown("somethingNew".into()));
    }

    #[test]
    fn missing_version_decodes_but_dispatcher_rejects_later() {
        let frame = Frame::decode(
            br#"{"key":"join","data":{"publicKey":"ab","discoveryKey":"d","modelName":"m","maxConnections":1}}"#,
        )
        .expect("decode");
        match frame {
            Frame::Join(payload) => assert!(payload.symmetry_core_version.is_none()),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[test]
    fn verify_session_payload_is_a_bare_string() {
        let frame = Frame::VerifySession("abc-123".into());
        let bytes = frame.encode().expect("encode");
        assert_eq!(Frame::decode(&bytes).expect("decode"), frame);
    }
}
