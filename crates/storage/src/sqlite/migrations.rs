use sqlx::SqlitePool;

use crate::error::{StoreError, StoreResult};

/// One ascending-numbered migration, applied inside a transaction and
/// recorded in the `migrations` table so re-running the binary is a no-op.
struct Migration {
    id: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        id: 1,
        name: "create_migrations_table",
        sql: r#"
            CREATE TABLE IF NOT EXISTS migrations (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        id: 2,
        name: "create_peers",
        sql: r#"
            CREATE TABLE IF NOT EXISTS peers (
                key TEXT PRIMARY KEY,
                discovery_key TEXT NOT NULL UNIQUE,
                model_name TEXT NOT NULL,
                api_provider TEXT,
                name TEXT,
                website TEXT,
                public INTEGER NOT NULL DEFAULT 0,
                data_collection_enabled INTEGER NOT NULL DEFAULT 0,
                server_key TEXT,
                max_connections INTEGER NOT NULL DEFAULT 1,
                connections INTEGER NOT NULL DEFAULT 0,
                online INTEGER NOT NULL DEFAULT 0,
                healthy INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_peers_model_online
                ON peers (model_name, online);
        "#,
    },
    Migration {
        id: 3,
        name: "create_provider_sessions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS provider_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                peer_key TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT,
                duration_minutes INTEGER NOT NULL DEFAULT 0,
                total_requests INTEGER NOT NULL DEFAULT 0
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_one_open_session_per_peer
                ON provider_sessions (peer_key)
                WHERE end_time IS NULL;
        "#,
    },
    Migration {
        id: 4,
        name: "create_metrics",
        sql: r#"
            CREATE TABLE IF NOT EXISTS metrics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id INTEGER NOT NULL REFERENCES provider_sessions (id),
                tokens_per_second REAL NOT NULL,
                total_tokens INTEGER NOT NULL,
                duration_ms INTEGER NOT NULL,
                model_name TEXT NOT NULL,
                reported_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        id: 5,
        name: "create_sessions",
        sql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                provider_discovery_key TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
        "#,
    },
    Migration {
        id: 6,
        name: "create_ip_messages",
        sql: r#"
            CREATE TABLE IF NOT EXISTS ip_messages (
                ip_address TEXT PRIMARY KEY,
                message_count INTEGER NOT NULL DEFAULT 0,
                first_seen TEXT NOT NULL,
                last_seen TEXT NOT NULL
            );
        "#,
    },
];

/// Applies every migration in `MIGRATIONS` whose id is not yet present in
/// the `migrations` table, in ascending order, each inside its own
/// transaction.
pub async fn apply(pool: &SqlitePool) -> StoreResult<()> {
    // The migrations table itself has to exist before we can query it.
    sqlx::query(MIGRATIONS[0].sql)
        .execute(pool)
        .await
        .map_err(StoreError::Backend)?;

    for migration in MIGRATIONS {
        let already_applied: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM migrations WHERE id = ?)")
            .bind(migration.id)
            .fetch_one(pool)
            .await
            .map_err(StoreError::Backend)?;

        if already_applied {
            continue;
        }

        let mut tx = pool.begin().await.map_err(StoreError::Backend)?;

        sqlx::raw_sql(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(|err| StoreError::Migration(format!("{}: {err}", migration.name)))?;

        sqlx::query("INSERT INTO migrations (id, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.id)
            .bind(migration.name)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(StoreError::Backend)?;

        tx.commit().await.map_err(StoreError::Backend)?;

        tracing::info!(id = migration.id, name = migration.name, "applied migration");
    }

    Ok(())
}
