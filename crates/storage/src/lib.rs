//! Repository traits for the dispatch hub's durable state, and the SQLite
//! implementation backing all of them in production.

pub mod error;
pub mod retry;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;
pub use traits::{PeerStore, ProviderSessionStore, RateLimitStore, SessionStore};

#[cfg(test)]
mod tests {
    use hub_types::NewPeer;

    use super::*;

    fn sample_peer(key: &str, model: &str) -> NewPeer {
        NewPeer {
            key: key.to_string(),
            discovery_key: format!("disco-{key}"),
            model_name: model.to_string(),
            api_provider: None,
            name: None,
            website: None,
            public: true,
            data_collection_enabled: false,
            server_key: None,
            max_connections: 4,
        }
    }

    #[tokio::test]
    async fn upsert_then_get_by_key_round_trips() {
        let store = SqliteStore::in_memory().await.unwrap();
        let peer = store.upsert(&sample_peer("abc", "llama3")).await.unwrap();

        assert_eq!(peer.key, "abc");
        assert!(peer.online);
        assert_eq!(peer.connections, 0);

        let fetched = store.get_by_key("abc").await.unwrap().unwrap();
        assert_eq!(fetched, peer);
    }

    #[tokio::test]
    async fn get_random_only_returns_online_peers_for_the_model() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert(&sample_peer("a", "llama3")).await.unwrap();
        store.set_offline("a").await.unwrap();

        assert!(store.get_random("llama3").await.unwrap().is_none());

        store.upsert(&sample_peer("b", "llama3")).await.unwrap();
        let chosen = store.get_random("llama3").await.unwrap().unwrap();
        assert_eq!(chosen.key, "b");
    }

    #[tokio::test]
    async fn get_random_does_not_filter_on_health_or_capacity() {
        let store = SqliteStore::in_memory().await.unwrap();
        let peer = store.upsert(&sample_peer("a", "llama3")).await.unwrap();
        store.set_healthy("a", false).await.unwrap();
        store.update_connections("a", peer.max_connections).await.unwrap();

        let chosen = store.get_random("llama3").await.unwrap().unwrap();
        assert_eq!(chosen.key, "a");
    }

    #[tokio::test]
    async fn session_create_verify_and_expiry() {
        let store = SqliteStore::in_memory().await.unwrap();
        let token = store.create("disco-a").await.unwrap();

        let bound = store.verify(&token).await.unwrap();
        assert_eq!(bound.as_deref(), Some("disco-a"));

        assert!(store.delete(&token).await.unwrap());
        assert!(store.verify(&token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn provider_session_lifecycle_enforces_one_open_row() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.upsert(&sample_peer("a", "llama3")).await.unwrap();

        let first = store.start("a").await.unwrap();
        assert_eq!(store.active_session_id("a").await.unwrap(), Some(first));

        store.end("a").await.unwrap();
        assert_eq!(store.active_session_id("a").await.unwrap(), None);

        let second = store.start("a").await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn rate_limit_window_expires() {
        let store = SqliteStore::in_memory().await.unwrap();
        let (count, _) = store.record("1.2.3.4").await.unwrap();
        assert_eq!(count, 1);

        let (count, _) = store.record("1.2.3.4").await.unwrap();
        assert_eq!(count, 2);

        assert!(store.get("1.2.3.4", 60).await.unwrap().is_some());
        assert!(store.get("1.2.3.4", 0).await.unwrap().is_none());
    }
}
