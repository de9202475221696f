use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use event_bus::EventBus;
use hub_p2p::PeerHandle;
use hub_storage::{PeerStore, ProviderSessionStore};
use hub_types::events::DispatcherEvent;
use hub_types::{
    Frame, HealthCheckFailedPayload, HealthCheckPayload, HEALTH_CHECK_INTERVAL_SECS,
    HEALTH_CHECK_TIMEOUT_SECS, SESSION_DURATION_TICK_SECS,
};

use crate::registry::Registry;

/// Refreshes `duration_minutes` on the peer's open provider session every
/// [`SESSION_DURATION_TICK_SECS`]. Runs until aborted by
/// [`Registry::detach`].
pub fn spawn_duration_ticker(peer_key: String, store: Arc<dyn ProviderSessionStore>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(SESSION_DURATION_TICK_SECS));
        ticker.tick().await; // the first tick fires immediately; skip it

        loop {
            ticker.tick().await;
            if let Err(err) = store.update_duration(&peer_key).await {
                tracing::error!(peer_key, %err, "failed to refresh session duration");
            }
        }
    })
}

/// Runs the health-check cycle for one peer: every
/// [`HEALTH_CHECK_INTERVAL_SECS`], send a `healthCheck` frame and wait up to
/// [`HEALTH_CHECK_TIMEOUT_SECS`] for the ack (delivered via
/// [`Registry::ack_health_check`] from the peer's read loop). A missed ack
/// marks the peer unhealthy and writes `healthCheckFailed`, but never
/// disconnects it.
pub fn spawn_health_cycle(
    peer_key: String,
    handle: Arc<dyn PeerHandle>,
    store: Arc<dyn PeerStore>,
    registry: Registry,
    events: EventBus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS)).await;

            let request_id = hex::encode(rand::random::<[u8; 16]>());
            let ack_rx = registry.arm_health_check(&peer_key).await;

            if handle
                .send(Frame::HealthCheck(HealthCheckPayload {
                    request_id: request_id.clone(),
                }))
                .await
                .is_err()
            {
                tracing::debug!(peer_key, "peer gone, stopping health cycle");
                return;
            }

            let acked = tokio::time::timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS), ack_rx).await;

            match acked {
                Ok(Ok(())) => {
                    if let Err(err) = store.set_healthy(&peer_key, true).await {
                        tracing::error!(peer_key, %err, "failed to record healthy peer");
                    }
                }
                _ => {
                    tracing::warn!(peer_key, request_id, "peer missed health-check ack");
                    if let Err(err) = store.set_healthy(&peer_key, false).await {
                        tracing::error!(peer_key, %err, "failed to record unhealthy peer");
                    }
                    let _ = events
                        .try_send(DispatcherEvent::PeerUnhealthy {
                            peer_key: peer_key.clone(),
                        })
                        .await;
                    let _ = handle
                        .send(Frame::HealthCheckFailed(HealthCheckFailedPayload { request_id }))
                        .await;
                }
            }
        }
    })
}
