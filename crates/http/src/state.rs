use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hub_dispatcher::Dispatcher;
use hub_storage::RateLimitStore;

/// Shared state handed to every axum handler. Cheap to clone (everything
/// behind an `Arc`), matching how the dispatcher hands connected-peer state
/// to each `PeerSession`.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub rate_limits: Arc<dyn RateLimitStore>,
    pub allowed_origins: Vec<String>,
    /// Flipped once the store pool and peer-transport listener are both up.
    /// `GET /healthz` reads this; nothing else does.
    pub ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Relaxed);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }
}
