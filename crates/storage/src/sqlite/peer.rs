use async_trait::async_trait;
use chrono::Utc;
use hub_types::{NewPeer, Peer, PeerDirectoryEntry};
use sqlx::Row;

use super::SqliteStore;
use crate::error::StoreResult;
use crate::retry::with_backoff;
use crate::traits::PeerStore;

fn row_to_peer(row: &sqlx::sqlite::SqliteRow) -> Peer {
    Peer {
        key: row.get("key"),
        discovery_key: row.get("discovery_key"),
        model_name: row.get("model_name"),
        api_provider: row.get("api_provider"),
        name: row.get("name"),
        website: row.get("website"),
        public: row.get("public"),
        data_collection_enabled: row.get("data_collection_enabled"),
        server_key: row.get("server_key"),
        max_connections: row.get("max_connections"),
        connections: row.get("connections"),
        online: row.get("online"),
        healthy: row.get("healthy"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PeerStore for SqliteStore {
    async fn upsert(&self, peer: &NewPeer) -> StoreResult<Peer> {
        with_backoff(|| async {
            let now = Utc::now();
            sqlx::query(
                r#"
                INSERT INTO peers (
                    key, discovery_key, model_name, api_provider, name, website,
                    public, data_collection_enabled, server_key, max_connections,
                    connections, online, healthy, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 1, 1, ?, ?)
                ON CONFLICT (key) DO UPDATE SET
                    discovery_key = excluded.discovery_key,
                    model_name = excluded.model_name,
                    api_provider = excluded.api_provider,
                    name = excluded.name,
                    website = excluded.website,
                    public = excluded.public,
                    data_collection_enabled = excluded.data_collection_enabled,
                    server_key = excluded.server_key,
                    max_connections = excluded.max_connections,
                    online = 1,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&peer.key)
            .bind(&peer.discovery_key)
            .bind(&peer.model_name)
            .bind(&peer.api_provider)
            .bind(&peer.name)
            .bind(&peer.website)
            .bind(peer.public)
            .bind(peer.data_collection_enabled)
            .bind(&peer.server_key)
            .bind(peer.max_connections)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
        })
        .await?;

        self.get_by_key(&peer.key)
            .await?
            .ok_or(crate::error::StoreError::Migration(
                "upsert did not produce a row".into(),
            ))
    }

    async fn set_offline(&self, key: &str) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query("UPDATE peers SET online = 0, updated_at = ? WHERE key = ?")
                .bind(Utc::now())
                .bind(key)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    async fn update_connections(&self, key: &str, connections: i64) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query("UPDATE peers SET connections = ?, updated_at = ? WHERE key = ?")
                .bind(connections)
                .bind(Utc::now())
                .bind(key)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    async fn set_healthy(&self, key: &str, healthy: bool) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query("UPDATE peers SET healthy = ?, updated_at = ? WHERE key = ?")
                .bind(healthy)
                .bind(Utc::now())
                .bind(key)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    async fn get_by_key(&self, key: &str) -> StoreResult<Option<Peer>> {
        let row = with_backoff(|| async {
            sqlx::query("SELECT * FROM peers WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        Ok(row.as_ref().map(row_to_peer))
    }

    async fn get_by_discovery_key(&self, discovery_key: &str) -> StoreResult<Option<Peer>> {
        let row = with_backoff(|| async {
            sqlx::query("SELECT * FROM peers WHERE discovery_key = ?")
                .bind(discovery_key)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        Ok(row.as_ref().map(row_to_peer))
    }

    async fn get_random(&self, model_name: &str) -> StoreResult<Option<Peer>> {
        let row = with_backoff(|| async {
            sqlx::query(
                "SELECT * FROM peers \
                 WHERE online = 1 AND model_name = ? \
                 ORDER BY RANDOM() LIMIT 1",
            )
            .bind(model_name)
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        Ok(row.as_ref().map(row_to_peer))
    }

    async fn reset_all_connections(&self) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query("UPDATE peers SET online = 0, connections = 0")
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    async fn get_all(&self) -> StoreResult<Vec<PeerDirectoryEntry>> {
        let rows = with_backoff(|| async {
            sqlx::query(
                r#"
                SELECT
                    p.*,
                    COUNT(DISTINCT ps.id) AS total_sessions,
                    COALESCE(SUM(ps.total_requests), 0) AS total_requests
                FROM peers p
                LEFT JOIN provider_sessions ps ON ps.peer_key = p.key
                GROUP BY p.key
                ORDER BY p.created_at
                "#,
            )
            .fetch_all(&self.pool)
            .await
        })
        .await?;

        Ok(rows
            .iter()
            .map(|row| PeerDirectoryEntry {
                peer: row_to_peer(row),
                total_sessions: row.get("total_sessions"),
                total_requests: row.get("total_requests"),
            })
            .collect())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let result = with_backoff(|| async {
            sqlx::query("DELETE FROM peers WHERE key = ?")
                .bind(key)
                .execute(&self.pool)
                .await
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
