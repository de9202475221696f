use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::SqliteStore;
use crate::error::StoreResult;
use crate::retry::with_backoff;
use crate::traits::RateLimitStore;

#[async_trait]
impl RateLimitStore for SqliteStore {
    async fn record(&self, ip: &str) -> StoreResult<(i64, DateTime<Utc>)> {
        let now = Utc::now();

        with_backoff(|| async {
            sqlx::query(
                "INSERT INTO ip_messages (ip_address, message_count, first_seen, last_seen) \
                 VALUES (?, 1, ?, ?) \
                 ON CONFLICT (ip_address) DO UPDATE SET \
                    message_count = message_count + 1, \
                    last_seen = excluded.last_seen",
            )
            .bind(ip)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await
        })
        .await?;

        let row = with_backoff(|| async {
            sqlx::query_as::<_, (i64, DateTime<Utc>)>(
                "SELECT message_count, last_seen FROM ip_messages WHERE ip_address = ?",
            )
            .bind(ip)
            .fetch_one(&self.pool)
            .await
        })
        .await?;

        Ok(row)
    }

    async fn get(&self, ip: &str, window_minutes: i64) -> StoreResult<Option<(i64, DateTime<Utc>)>> {
        let row = with_backoff(|| async {
            sqlx::query_as::<_, (i64, DateTime<Utc>)>(
                "SELECT message_count, last_seen FROM ip_messages WHERE ip_address = ?",
            )
            .bind(ip)
            .fetch_optional(&self.pool)
            .await
        })
        .await?;

        let Some((count, last_seen)) = row else {
            return Ok(None);
        };

        if Utc::now() - last_seen > Duration::minutes(window_minutes) {
            return Ok(None);
        }

        Ok(Some((count, last_seen)))
    }
}
