use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey};
use event_bus::EventBus;
use tokio_util::sync::CancellationToken;

use hub_p2p::{ChannelPeerHandle, Connection, PeerHandle};
use hub_storage::{PeerStore, ProviderSessionStore, SessionStore};
use hub_types::events::DispatcherEvent;
use hub_types::{
    Frame, JoinAckPayload, NewPeer, ProviderDetailsPayload, SessionValidPayload,
    VersionMismatchPayload,
};

use crate::matchmaking::{self, MatchOutcome};
use crate::rate_limiter::PeerRateLimiter;
use crate::registry::{PeerTimers, Registry};
use crate::timers;

/// The store handles one peer session needs. Held as trait objects so a
/// test can swap in in-memory fakes without touching this module.
#[derive(Clone)]
pub struct Stores {
    pub peers: Arc<dyn PeerStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub provider_sessions: Arc<dyn ProviderSessionStore>,
}

enum State {
    Open,
    Joined { peer_key: String },
}

/// Drives one accepted connection through OPEN → JOINED → (implicitly)
/// CLOSED. Frames arrive strictly in order because everything runs in this
/// one task.
pub struct PeerSession {
    stores: Stores,
    registry: Registry,
    rate_limiter: Arc<PeerRateLimiter>,
    signing_key: Arc<SigningKey>,
    min_peer_version: String,
    events: EventBus,
    cancellation: CancellationToken,
}

impl PeerSession {
    pub fn new(
        stores: Stores,
        registry: Registry,
        rate_limiter: Arc<PeerRateLimiter>,
        signing_key: Arc<SigningKey>,
        min_peer_version: String,
        events: EventBus,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            stores,
            registry,
            rate_limiter,
            signing_key,
            min_peer_version,
            events,
            cancellation,
        }
    }

    /// Consumes the accepted connection and runs it to completion (peer
    /// disconnect, fatal transport error, or hub shutdown).
    pub async fn run(self, conn: Connection) {
        let peer_addr = conn.peer_addr;
        let (mut reader, writer) = conn.split();
        let handle: Arc<dyn PeerHandle> = Arc::new(ChannelPeerHandle::spawn(writer, peer_addr));

        let mut state = State::Open;

        loop {
            let bytes = tokio::select! {
                bytes = reader.recv_bytes() => bytes,
                _ = self.cancellation.cancelled() => break,
            };

            let bytes = match bytes {
                Ok(Some(bytes)) => bytes,
                Ok(None) => break,
                Err(err) => {
                    tracing::debug!(%peer_addr, %err, "connection read failed");
                    break;
                }
            };

            let frame = match Frame::decode(&bytes) {
                Ok(frame) => frame,
                Err(err) => {
                    if let State::Joined { peer_key } = &state {
                        if let Some(responder) = self.registry.responder_for(peer_key).await {
                            responder.send_chunk(bytes.to_vec()).await;
                            continue;
                        }
                    }
                    tracing::trace!(%peer_addr, %err, "dropped undecodable frame with no pending responder");
                    continue;
                }
            };

            match &state {
                State::Open => {
                    if let Frame::Join(payload) = &frame {
                        match self.handle_join(payload, &handle).await {
                            Ok(peer_key) => state = State::Joined { peer_key },
                            Err(()) => {} // versionMismatch already sent; stays OPEN
                        }
                    } else {
                        tracing::trace!(%peer_addr, "dropped non-join frame before handshake");
                    }
                }
                State::Joined { peer_key } => {
                    let peer_key = peer_key.clone();

                    if !self.rate_limiter.allow(&peer_key).await {
                        tracing::warn!(peer_key, "per-peer rate limit exceeded, dropping frame");
                        continue;
                    }

                    if let Err(err) = self.handle_joined_frame(&peer_key, frame, &handle).await {
                        tracing::error!(peer_key, %err, "failed to handle frame");
                    }
                }
            }
        }

        if let State::Joined { peer_key } = state {
            self.disconnect(&peer_key).await;
        }
    }

    async fn handle_join(
        &self,
        payload: &hub_types::JoinPayload,
        handle: &Arc<dyn PeerHandle>,
    ) -> Result<String, ()> {
        if !version_satisfies(payload.symmetry_core_version.as_deref(), &self.min_peer_version) {
            let _ = handle
                .send(Frame::VersionMismatch(VersionMismatchPayload {
                    min_version: self.min_peer_version.clone(),
                }))
                .await;
            let peer_key_prefix = payload.public_key.chars().take(8).collect();
            let _ = self
                .events
                .try_send(DispatcherEvent::VersionMismatch {
                    peer_key_prefix,
                    advertised: payload.symmetry_core_version.clone(),
                })
                .await;
            return Err(());
        }

        let new_peer = NewPeer {
            key: payload.public_key.clone(),
            discovery_key: payload.discovery_key.clone(),
            model_name: payload.model_name.clone(),
            api_provider: payload.api_provider.clone(),
            name: payload.name.clone(),
            website: payload.website.clone(),
            public: payload.public,
            data_collection_enabled: payload.data_collection_enabled,
            server_key: payload.server_key.clone(),
            max_connections: payload.max_connections,
        };

        let peer = match self.stores.peers.upsert(&new_peer).await {
            Ok(peer) => peer,
            Err(err) => {
                tracing::error!(%err, "failed to upsert joining peer, connection continues best-effort");
                return Err(());
            }
        };

        if let Err(err) = self.stores.provider_sessions.start(&peer.key).await {
            tracing::error!(peer_key = peer.key, %err, "failed to open provider session");
        }

        let duration_ticker = timers::spawn_duration_ticker(peer.key.clone(), self.stores.provider_sessions.clone());
        let health_ticker = timers::spawn_health_cycle(
            peer.key.clone(),
            handle.clone(),
            self.stores.peers.clone(),
            self.registry.clone(),
            self.events.clone(),
        );

        self.registry
            .attach(
                &peer.key,
                handle.clone(),
                PeerTimers {
                    duration_ticker,
                    health_ticker,
                },
            )
            .await;

        let _ = handle
            .send(Frame::JoinAck(JoinAckPayload {
                status: "ok".into(),
                key: peer.key.clone(),
            }))
            .await;

        tracing::info!(peer_key = peer.key, model = payload.model_name, "peer joined");
        let _ = self
            .events
            .try_send(DispatcherEvent::PeerJoined {
                peer_key: peer.key.clone(),
                model_name: payload.model_name.clone(),
            })
            .await;

        Ok(peer.key)
    }

    async fn handle_joined_frame(
        &self,
        peer_key: &str,
        frame: Frame,
        handle: &Arc<dyn PeerHandle>,
    ) -> eyre::Result<()> {
        match frame {
            Frame::Challenge(payload) => {
                let signature = self.signing_key.sign(payload.challenge.as_bytes());
                handle
                    .send(Frame::ChallengeSigned(hub_types::ChallengeSignedPayload {
                        signature: hex::encode(signature.to_bytes()),
                    }))
                    .await?;
            }
            Frame::ConnectionSize(payload) => {
                self.stores
                    .peers
                    .update_connections(peer_key, payload.connections)
                    .await?;
            }
            Frame::RequestProvider(payload) => {
                self.handle_request_provider(&payload.model_name, handle).await?;
            }
            Frame::VerifySession(token) => {
                self.handle_verify_session(&token, handle).await?;
            }
            Frame::Inference(payload) => {
                self.registry.route_inference_token(&payload.key, peer_key).await;
                if let Some(session_id) = self.stores.provider_sessions.active_session_id(peer_key).await? {
                    self.stores.provider_sessions.log_request(session_id).await?;
                }
            }
            Frame::SendMetrics(report) => {
                if let Some(session_id) = self.stores.provider_sessions.active_session_id(peer_key).await? {
                    self.stores.provider_sessions.add_metrics(session_id, &report).await?;
                }
            }
            Frame::HealthCheck(_) => {
                self.registry.ack_health_check(peer_key).await;
            }
            Frame::InferenceEnded => {
                if let Some(responder) = self.registry.remove_responder(peer_key).await {
                    responder.end().await;
                }
            }
            Frame::Join(_) | Frame::ChallengeSigned(_) | Frame::HealthCheckFailed(_) | Frame::Unknown(_) => {
                tracing::trace!(peer_key, "ignored frame not expected from a joined peer");
            }
            Frame::JoinAck(_) | Frame::VersionMismatch(_) | Frame::ProviderDetails(_) | Frame::SessionValid(_) => {
                tracing::trace!(peer_key, "ignored hub-to-peer-only frame received from peer");
            }
        }

        Ok(())
    }

    async fn handle_request_provider(&self, model_name: &str, handle: &Arc<dyn PeerHandle>) -> eyre::Result<()> {
        match matchmaking::find_provider(self.stores.peers.as_ref(), model_name).await? {
            MatchOutcome::Matched(provider) => {
                let token = self.stores.sessions.create(&provider.discovery_key).await?;
                handle
                    .send(Frame::ProviderDetails(ProviderDetailsPayload {
                        provider_id: provider.key,
                        session_token: token,
                    }))
                    .await?;
            }
            MatchOutcome::Saturated(_) => {
                // Silence by design: the caller is expected to retry.
            }
            MatchOutcome::NoneAvailable => {
                let _ = self
                    .events
                    .try_send(DispatcherEvent::MatchmakingFailed {
                        model_name: model_name.to_string(),
                    })
                    .await;
            }
        }
        Ok(())
    }

    async fn handle_verify_session(&self, token: &str, handle: &Arc<dyn PeerHandle>) -> eyre::Result<()> {
        let Some(discovery_key) = self.stores.sessions.verify(token).await? else {
            return Ok(());
        };
        self.stores.sessions.extend(token).await?;

        let Some(provider) = self.stores.peers.get_by_discovery_key(&discovery_key).await? else {
            return Ok(());
        };

        handle
            .send(Frame::SessionValid(SessionValidPayload {
                discovery_key: provider.discovery_key,
                model_name: provider.model_name,
                name: provider.name,
                provider: provider.api_provider,
            }))
            .await?;
        Ok(())
    }

    async fn disconnect(&self, peer_key: &str) {
        tracing::info!(peer_key, "peer disconnected");
        self.registry.detach(peer_key).await;
        if let Err(err) = self.stores.peers.set_offline(peer_key).await {
            tracing::error!(peer_key, %err, "failed to mark peer offline on disconnect");
        }
        if let Err(err) = self.stores.provider_sessions.end(peer_key).await {
            tracing::error!(peer_key, %err, "failed to end provider session on disconnect");
        }
        let _ = self
            .events
            .try_send(DispatcherEvent::PeerDisconnected {
                peer_key: peer_key.to_string(),
            })
            .await;
    }
}

fn version_satisfies(advertised: Option<&str>, minimum: &str) -> bool {
    let Some(advertised) = advertised else {
        return false;
    };

    let parse = |v: &str| -> Vec<u64> { v.split('.').map(|part| part.parse().unwrap_or(0)).collect() };

    parse(advertised) >= parse(minimum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_satisfies_rejects_missing_version() {
        assert!(!version_satisfies(None, "1.0.0"));
    }

    #[test]
    fn version_satisfies_compares_numerically_not_lexically() {
        assert!(version_satisfies(Some("1.10.0"), "1.9.0"));
        assert!(!version_satisfies(Some("1.2.0"), "1.9.0"));
    }

    #[test]
    fn version_satisfies_accepts_equal_version() {
        assert!(version_satisfies(Some("1.0.0"), "1.0.0"));
    }
}
