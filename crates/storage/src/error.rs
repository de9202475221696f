use thiserror::Error;

/// Errors surfaced by a repository once retries (see [`crate::retry`]) are
/// exhausted. Callers never see a raw `sqlx::Error` — everything crosses the
/// trait boundary as one of these.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is busy and retries were exhausted")]
    Busy,
    #[error("store backend error: {0}")]
    Backend(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
