use async_trait::async_trait;

use crate::error::StoreResult;

/// Short-lived bearer tokens binding a consumer to a provider's discovery
/// key. Expiry is never reported to the caller as an error: absent and
/// expired tokens both verify to `None`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a new session bound to `provider_discovery_key`, expiring in
    /// 10 minutes, and returns its token.
    async fn create(&self, provider_discovery_key: &str) -> StoreResult<String>;

    /// Returns the bound discovery key if the token exists and has not
    /// expired. An expired row is deleted as a side effect of verifying it.
    async fn verify(&self, token: &str) -> StoreResult<Option<String>>;

    /// Pushes `expires_at` to 10 minutes from now. A no-op if the token is
    /// absent.
    async fn extend(&self, token: &str) -> StoreResult<()>;

    /// Removes the session. Returns whether a row was actually deleted.
    async fn delete(&self, token: &str) -> StoreResult<bool>;
}
