mod migrations;
mod peer;
mod provider_session;
mod rate_limit;
mod session;

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::{StoreError, StoreResult};

/// A SQLite-backed implementation of every store trait in [`crate::traits`].
///
/// Runs in write-ahead-log mode with a large `mmap_size` so concurrent
/// readers don't block on the single writer; the pool itself serialises
/// writers, and [`crate::retry::with_backoff`] absorbs the rare "database is
/// locked" error that slips through under load.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

const MMAP_SIZE_BYTES: i64 = 256 * 1024 * 1024;

impl SqliteStore {
    /// Opens (creating if absent) the database file at `path`, applies
    /// pending migrations, and returns a ready store.
    pub async fn connect(path: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(StoreError::Backend)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .pragma("mmap_size", MMAP_SIZE_BYTES.to_string());

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(StoreError::Backend)?;

        migrations::apply(&pool).await?;

        Ok(Self { pool })
    }

    /// An in-memory store for tests. A single pooled connection, since each
    /// `:memory:` connection is otherwise its own independent database.
    #[cfg(test)]
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StoreError::Backend)?
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StoreError::Backend)?;

        migrations::apply(&pool).await?;

        Ok(Self { pool })
    }
}
