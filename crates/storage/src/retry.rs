use std::future::Future;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

const MAX_ATTEMPTS: u32 = 5;
const BASE_DELAY_MS: u64 = 100;

/// Retries `op` up to [`MAX_ATTEMPTS`] times with exponential backoff
/// (`100ms * 2^attempt`) when it fails with a transient "database is busy"
/// error. Any other error, or a busy error on the last attempt, propagates
/// immediately.
pub async fn with_backoff<T, F, Fut>(mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_busy(&err) && attempt + 1 < MAX_ATTEMPTS => {
                let delay = Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt));
                tracing::warn!(attempt, ?delay, "store busy, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) if is_busy(&err) => {
                tracing::error!("store busy, retries exhausted");
                return Err(StoreError::Busy);
            }
            Err(err) => return Err(StoreError::Backend(err)),
        }
    }
}

fn is_busy(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.message().contains("database is locked")
            || db.message().contains("database is busy")
    )
}
