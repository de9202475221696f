use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::RngCore;

use super::SqliteStore;
use crate::error::StoreResult;
use crate::retry::with_backoff;
use crate::traits::SessionStore;

const SESSION_TTL_SECS: i64 = hub_types::BROKER_SESSION_TTL_SECS;

fn new_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn create(&self, provider_discovery_key: &str) -> StoreResult<String> {
        let token = new_token();
        let now = Utc::now();
        let expires_at = now + Duration::seconds(SESSION_TTL_SECS);

        with_backoff(|| async {
            sqlx::query(
                "INSERT INTO sessions (id, provider_discovery_key, created_at, expires_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&token)
            .bind(provider_discovery_key)
            .bind(now)
            .bind(expires_at)
            .execute(&self.pool)
            .await
        })
        .await?;

        Ok(token)
    }

    async fn verify(&self, token: &str) -> StoreResult<Option<String>> {
        let row = with_backoff(|| async {
            sqlx::query_as::<_, (String, chrono::DateTime<Utc>)>(
                "SELECT provider_discovery_key, expires_at FROM sessions WHERE id = ?",
            )
            .bind(token)
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        let Some((discovery_key, expires_at)) = row else {
            return Ok(None);
        };

        if expires_at < Utc::now() {
            self.delete(token).await?;
            return Ok(None);
        }

        Ok(Some(discovery_key))
    }

    async fn extend(&self, token: &str) -> StoreResult<()> {
        let expires_at = Utc::now() + Duration::seconds(SESSION_TTL_SECS);
        with_backoff(|| async {
            sqlx::query("UPDATE sessions SET expires_at = ? WHERE id = ?")
                .bind(expires_at)
                .bind(token)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    async fn delete(&self, token: &str) -> StoreResult<bool> {
        let result = with_backoff(|| async {
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(token)
                .execute(&self.pool)
                .await
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
