use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;

use hub_p2p::PeerHandle;

use crate::responder::ResponderSink;

/// The two cancellable background tasks every joined peer runs. Aborted
/// together whenever the peer's registry entry is removed.
pub struct PeerTimers {
    pub duration_ticker: JoinHandle<()>,
    pub health_ticker: JoinHandle<()>,
}

impl PeerTimers {
    fn abort(&self) {
        self.duration_ticker.abort();
        self.health_ticker.abort();
    }
}

struct ConnectedPeer {
    handle: Arc<dyn PeerHandle>,
    timers: PeerTimers,
}

/// The hub's single in-memory serialisation domain: connected peers, their
/// timers, pending HTTP responders, and the inference-token index. Every
/// mutation goes through one of this type's methods so no two tasks race on
/// the same peer's state.
#[derive(Clone, Default)]
pub struct Registry {
    peers: Arc<RwLock<HashMap<String, ConnectedPeer>>>,
    responders: Arc<RwLock<HashMap<String, ResponderSink>>>,
    inference_tokens: Arc<RwLock<HashMap<String, String>>>,
    health_acks: Arc<RwLock<HashMap<String, oneshot::Sender<()>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `peer_key` to its live connection and timers. Replacing an
    /// existing entry (a peer rejoining without a clean disconnect) aborts
    /// the stale timers first.
    pub async fn attach(&self, peer_key: &str, handle: Arc<dyn PeerHandle>, timers: PeerTimers) {
        let mut peers = self.peers.write().await;
        if let Some(previous) = peers.remove(peer_key) {
            previous.timers.abort();
        }
        peers.insert(peer_key.to_string(), ConnectedPeer { handle, timers });
    }

    pub async fn handle_for(&self, peer_key: &str) -> Option<Arc<dyn PeerHandle>> {
        self.peers.read().await.get(peer_key).map(|p| p.handle.clone())
    }

    pub async fn is_connected(&self, peer_key: &str) -> bool {
        self.peers.read().await.contains_key(peer_key)
    }

    /// Tears down everything owned by `peer_key`: timers, its inference
    /// token mappings, and its pending responder (told `"peer disconnected"`
    /// as a terminator).
    pub async fn detach(&self, peer_key: &str) {
        if let Some(connected) = self.peers.write().await.remove(peer_key) {
            connected.timers.abort();
        }

        self.inference_tokens
            .write()
            .await
            .retain(|_, owner| owner != peer_key);

        self.health_acks.write().await.remove(peer_key);

        if let Some(responder) = self.responders.write().await.remove(peer_key) {
            responder.error("peer disconnected").await;
        }
    }

    /// Registers `sink` as the pending HTTP responder for `peer_key`.
    /// Returns `false` without replacing anything if one is already
    /// registered — at most one pending responder per peer at a time.
    pub async fn register_responder(&self, peer_key: &str, sink: ResponderSink) -> bool {
        let mut responders = self.responders.write().await;
        if responders.contains_key(peer_key) {
            return false;
        }
        responders.insert(peer_key.to_string(), sink);
        true
    }

    pub async fn responder_for(&self, peer_key: &str) -> Option<ResponderSink> {
        self.responders.read().await.get(peer_key).cloned()
    }

    pub async fn remove_responder(&self, peer_key: &str) -> Option<ResponderSink> {
        self.responders.write().await.remove(peer_key)
    }

    pub async fn route_inference_token(&self, token: &str, peer_key: &str) {
        self.inference_tokens
            .write()
            .await
            .insert(token.to_string(), peer_key.to_string());
    }

    pub async fn peer_for_token(&self, token: &str) -> Option<String> {
        self.inference_tokens.read().await.get(token).cloned()
    }

    /// Arms a health-check ack wait for `peer_key`, replacing any unacked
    /// prior cycle (which simply times out early, which is harmless).
    pub async fn arm_health_check(&self, peer_key: &str) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.health_acks.write().await.insert(peer_key.to_string(), tx);
        rx
    }

    pub async fn ack_health_check(&self, peer_key: &str) {
        if let Some(tx) = self.health_acks.write().await.remove(peer_key) {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::net::SocketAddr;

    use hub_p2p::ConnectionId;
    use hub_types::Frame;

    use super::*;

    struct NullHandle;

    #[async_trait]
    impl PeerHandle for NullHandle {
        fn id(&self) -> ConnectionId {
            ConnectionId(0)
        }
        fn peer_addr(&self) -> SocketAddr {
            "127.0.0.1:0".parse().unwrap()
        }
        async fn send(&self, _frame: Frame) -> Result<(), hub_p2p::handle::Error> {
            Ok(())
        }
    }

    fn noop_timers() -> PeerTimers {
        PeerTimers {
            duration_ticker: tokio::spawn(async {}),
            health_ticker: tokio::spawn(async {}),
        }
    }

    #[tokio::test]
    async fn detach_clears_timers_tokens_and_responder() {
        let registry = Registry::new();
        registry.attach("peer-a", Arc::new(NullHandle), noop_timers()).await;
        registry.route_inference_token("tok-1", "peer-a").await;
        let (sink, _rx) = ResponderSink::channel();
        assert!(registry.register_responder("peer-a", sink).await);

        registry.detach("peer-a").await;

        assert!(!registry.is_connected("peer-a").await);
        assert_eq!(registry.peer_for_token("tok-1").await, None);
        assert!(registry.responder_for("peer-a").await.is_none());
    }

    #[tokio::test]
    async fn register_responder_refuses_a_second_one() {
        let registry = Registry::new();
        let (first, _rx1) = ResponderSink::channel();
        let (second, _rx2) = ResponderSink::channel();

        assert!(registry.register_responder("peer-a", first).await);
        assert!(!registry.register_responder("peer-a", second).await);
    }

    #[tokio::test]
    async fn health_ack_wakes_the_armed_receiver() {
        let registry = Registry::new();
        let rx = registry.arm_health_check("peer-a").await;
        registry.ack_health_check("peer-a").await;
        assert!(rx.await.is_ok());
    }
}
