//! The connection/session dispatcher: the state machine that turns raw
//! peer-transport connections into durable peer and session records,
//! matchmaking, health checks, per-peer rate limiting, and inference
//! request/response routing.

pub mod matchmaking;
pub mod rate_limiter;
pub mod registry;
pub mod responder;
pub mod session;
mod timers;

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use event_bus::EventBus;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use hub_p2p::Listener;
use hub_types::events::DispatcherEvent;

pub use rate_limiter::PeerRateLimiter;
pub use registry::Registry;
pub use responder::{ResponderEvent, ResponderSink};
pub use session::{PeerSession, Stores};

/// Registers the channel this crate publishes on. Call once against the
/// process-wide bus before extracting a sender for [`Dispatcher::new`].
pub fn register_events(bus: &mut EventBus) {
    bus.register::<DispatcherEvent>(Some(256));
}

/// Top-level owner of the dispatcher's shared state. Accepts connections
/// from a [`Listener`] and spawns one [`PeerSession`] task per connection,
/// all tracked so shutdown can drain them.
pub struct Dispatcher {
    stores: Stores,
    registry: Registry,
    rate_limiter: Arc<PeerRateLimiter>,
    signing_key: Arc<SigningKey>,
    min_peer_version: String,
    events: EventBus,
}

impl Dispatcher {
    pub fn new(
        stores: Stores,
        signing_key: SigningKey,
        min_peer_version: String,
        full_event_bus: &EventBus,
    ) -> eyre::Result<Self> {
        let events = full_event_bus.extract(&event_bus::typeid![DispatcherEvent], &event_bus::typeid![])?;

        Ok(Self {
            stores,
            registry: Registry::new(),
            rate_limiter: Arc::new(PeerRateLimiter::new()),
            signing_key: Arc::new(signing_key),
            min_peer_version,
            events,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Runs the accept loop until `cancellation` fires. Every accepted
    /// connection is handed to its own [`PeerSession`] task, tracked by
    /// `tasks` so the caller can await their drain on shutdown.
    pub async fn run_listener(&self, listener: Listener, tasks: &TaskTracker, cancellation: CancellationToken) {
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok(conn) => {
                            let session = PeerSession::new(
                                self.stores.clone(),
                                self.registry.clone(),
                                self.rate_limiter.clone(),
                                self.signing_key.clone(),
                                self.min_peer_version.clone(),
                                self.events.clone(),
                                cancellation.clone(),
                            );
                            tasks.spawn(session.run(conn));
                        }
                        Err(err) => {
                            tracing::error!(%err, "failed to accept peer connection");
                        }
                    }
                }
                _ = cancellation.cancelled() => {
                    tracing::info!("dispatcher accept loop shutting down");
                    return;
                }
            }
        }
    }
}
