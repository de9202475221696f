use async_trait::async_trait;
use chrono::Utc;
use hub_types::{MetricsReport, SessionStats};
use sqlx::Row;

use super::SqliteStore;
use crate::error::StoreResult;
use crate::retry::with_backoff;
use crate::traits::ProviderSessionStore;

#[async_trait]
impl ProviderSessionStore for SqliteStore {
    async fn start(&self, peer_key: &str) -> StoreResult<i64> {
        let id = with_backoff(|| async {
            sqlx::query(
                "INSERT INTO provider_sessions (peer_key, start_time, duration_minutes, total_requests) \
                 VALUES (?, ?, 0, 0)",
            )
            .bind(peer_key)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
        })
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    async fn update_duration(&self, peer_key: &str) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query(
                "UPDATE provider_sessions \
                 SET duration_minutes = CAST((julianday('now') - julianday(start_time)) * 1440 AS INTEGER) \
                 WHERE peer_key = ? AND end_time IS NULL",
            )
            .bind(peer_key)
            .execute(&self.pool)
            .await
        })
        .await?;
        Ok(())
    }

    async fn end(&self, peer_key: &str) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query(
                "UPDATE provider_sessions SET end_time = ? \
                 WHERE peer_key = ? AND end_time IS NULL",
            )
            .bind(Utc::now())
            .bind(peer_key)
            .execute(&self.pool)
            .await
        })
        .await?;
        Ok(())
    }

    async fn end_orphans(&self) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query("UPDATE provider_sessions SET end_time = ? WHERE end_time IS NULL")
                .bind(Utc::now())
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    async fn active_session_id(&self, peer_key: &str) -> StoreResult<Option<i64>> {
        let row = with_backoff(|| async {
            sqlx::query("SELECT id FROM provider_sessions WHERE peer_key = ? AND end_time IS NULL")
                .bind(peer_key)
                .fetch_optional(&self.pool)
                .await
        })
        .await?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn add_metrics(&self, session_id: i64, report: &MetricsReport) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query(
                "INSERT INTO metrics \
                 (session_id, tokens_per_second, total_tokens, duration_ms, model_name, reported_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(session_id)
            .bind(report.tokens_per_second)
            .bind(report.total_tokens)
            .bind(report.duration_ms)
            .bind(&report.model_name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await
        })
        .await?;
        Ok(())
    }

    async fn log_request(&self, session_id: i64) -> StoreResult<()> {
        with_backoff(|| async {
            sqlx::query("UPDATE provider_sessions SET total_requests = total_requests + 1 WHERE id = ?")
                .bind(session_id)
                .execute(&self.pool)
                .await
        })
        .await?;
        Ok(())
    }

    async fn stats(&self) -> StoreResult<SessionStats> {
        let row = with_backoff(|| async {
            sqlx::query(
                r#"
                SELECT
                    COUNT(*) AS total_sessions,
                    COALESCE(SUM(CASE WHEN end_time IS NULL THEN 1 ELSE 0 END), 0) AS active_sessions,
                    COALESCE(SUM(total_requests), 0) AS total_requests,
                    COALESCE(SUM(
                        CASE WHEN date(start_time) = date('now') THEN total_requests ELSE 0 END
                    ), 0) AS requests_today,
                    COALESCE(AVG(duration_minutes), 0.0) AS average_duration_minutes,
                    COALESCE(SUM(duration_minutes), 0) AS total_duration_minutes
                FROM provider_sessions
                "#,
            )
            .fetch_one(&self.pool)
            .await
        })
        .await?;

        Ok(SessionStats {
            total_sessions: row.get("total_sessions"),
            active_sessions: row.get("active_sessions"),
            total_requests: row.get("total_requests"),
            requests_today: row.get("requests_today"),
            average_duration_minutes: row.get("average_duration_minutes"),
            total_duration_minutes: row.get("total_duration_minutes"),
        })
    }
}
