use hub_storage::{PeerStore, StoreError};
use hub_types::{Peer, MATCHMAKING_MAX_ATTEMPTS};

/// Result of a matchmaking attempt. A saturated match is deliberately not
/// retried — the caller is expected to ask again later rather than the hub
/// busy-looping on a provider that is already at capacity.
pub enum MatchOutcome {
    Matched(Peer),
    Saturated(Peer),
    NoneAvailable,
}

/// Picks a uniformly random online peer serving `model_name`, retrying up to
/// [`MATCHMAKING_MAX_ATTEMPTS`] times only while the store finds nothing at
/// all (a transient race against a peer's `online` flag flipping).
pub async fn find_provider(store: &dyn PeerStore, model_name: &str) -> Result<MatchOutcome, StoreError> {
    for _ in 0..MATCHMAKING_MAX_ATTEMPTS {
        match store.get_random(model_name).await? {
            Some(peer) if peer.connections >= peer.max_connections => {
                return Ok(MatchOutcome::Saturated(peer));
            }
            Some(peer) => return Ok(MatchOutcome::Matched(peer)),
            None => continue,
        }
    }
    Ok(MatchOutcome::NoneAvailable)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use hub_types::{NewPeer, PeerDirectoryEntry};

    use super::*;

    /// A minimal in-memory [`PeerStore`] fake sufficient to exercise
    /// matchmaking without a database.
    struct FakePeerStore {
        peers: Mutex<HashMap<String, Peer>>,
    }

    impl FakePeerStore {
        fn with(peers: Vec<Peer>) -> Self {
            Self {
                peers: Mutex::new(peers.into_iter().map(|p| (p.key.clone(), p)).collect()),
            }
        }
    }

    fn peer(key: &str, model: &str, connections: i64, max_connections: i64) -> Peer {
        Peer {
            key: key.into(),
            discovery_key: format!("disco-{key}"),
            model_name: model.into(),
            api_provider: None,
            name: None,
            website: None,
            public: true,
            data_collection_enabled: false,
            server_key: None,
            max_connections,
            connections,
            online: true,
            healthy: true,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[async_trait]
    impl PeerStore for FakePeerStore {
        async fn upsert(&self, _peer: &NewPeer) -> Result<Peer, StoreError> {
            unimplemented!("not exercised by matchmaking tests")
        }
        async fn set_offline(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn set_healthy(&self, _key: &str, _healthy: bool) -> Result<(), StoreError> {
            Ok(())
        }
        async fn update_connections(&self, _key: &str, _connections: i64) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_by_key(&self, key: &str) -> Result<Option<Peer>, StoreError> {
            Ok(self.peers.lock().unwrap().get(key).cloned())
        }
        async fn get_by_discovery_key(&self, _discovery_key: &str) -> Result<Option<Peer>, StoreError> {
            Ok(None)
        }
        async fn get_random(&self, model_name: &str) -> Result<Option<Peer>, StoreError> {
            Ok(self
                .peers
                .lock()
                .unwrap()
                .values()
                .find(|p| p.online && p.model_name == model_name)
                .cloned())
        }
        async fn reset_all_connections(&self) -> Result<(), StoreError> {
            Ok(())
        }
        async fn get_all(&self) -> Result<Vec<PeerDirectoryEntry>, StoreError> {
            Ok(Vec::new())
        }
        async fn delete(&self, _key: &str) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn matches_an_available_peer() {
        let store = FakePeerStore::with(vec![peer("a", "llama3", 0, 4)]);
        match find_provider(&store, "llama3").await.unwrap() {
            MatchOutcome::Matched(p) => assert_eq!(p.key, "a"),
            _ => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn saturated_peer_fails_fast_without_retry() {
        let store = FakePeerStore::with(vec![peer("a", "llama3", 4, 4)]);
        match find_provider(&store, "llama3").await.unwrap() {
            MatchOutcome::Saturated(p) => assert_eq!(p.key, "a"),
            _ => panic!("expected saturated"),
        }
    }

    #[tokio::test]
    async fn no_matching_model_returns_none_available() {
        let store = FakePeerStore::with(vec![peer("a", "mistral", 0, 4)]);
        match find_provider(&store, "llama3").await.unwrap() {
            MatchOutcome::NoneAvailable => {}
            _ => panic!("expected none available"),
        }
    }
}
