use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use event_bus::EventBus;
use eyre::{Context, ContextCompat};
use tokio::select;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use hub_dispatcher::{Dispatcher, Stores};
use hub_p2p::Listener;
use hub_storage::{PeerStore, ProviderSessionStore, RateLimitStore, SqliteStore};
use hub_types::HubConfig;

/// Encapsulates the hub's top-level lifecycle: storage, the dispatcher, the
/// peer-transport listener and the HTTP front door.
pub struct Hub {
    config: HubConfig,
    dispatcher: Arc<Dispatcher>,
    rate_limits: Arc<dyn RateLimitStore>,
    cancellation: CancellationToken,
    pub(crate) task_tracker: TaskTracker,
}

impl Hub {
    pub async fn new(config: HubConfig) -> eyre::Result<Self> {
        let store = Self::init_store(&config.path).await?;

        store
            .reset_all_connections()
            .await
            .wrap_err("failed to reset peer connections on startup")?;
        store
            .end_orphans()
            .await
            .wrap_err("failed to close orphan provider sessions on startup")?;

        let signing_key = Self::load_signing_key(&config.private_key)?;

        let mut event_bus = EventBus::default();
        hub_dispatcher::register_events(&mut event_bus);
        Self::spawn_event_logger(&event_bus);

        let stores = Stores {
            peers: Arc::new(store.clone()),
            sessions: Arc::new(store.clone()),
            provider_sessions: Arc::new(store.clone()),
        };

        let dispatcher = Arc::new(Dispatcher::new(
            stores,
            signing_key,
            config.min_peer_version.clone(),
            &event_bus,
        )?);

        let rate_limits: Arc<dyn RateLimitStore> = Arc::new(store.clone());

        Ok(Self {
            config,
            dispatcher,
            rate_limits,
            cancellation: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        })
    }

    /// Wait for the signal from any hub service about the cancellation.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }

    /// Starts the peer-transport listener and the HTTP front door. Both run
    /// until `shutdown` cancels the shared token.
    pub async fn run(&self) -> eyre::Result<()> {
        let listener = Listener::bind(&self.config.p2p_bind_addr)
            .await
            .wrap_err("failed to bind peer-transport listener")?;

        let dispatcher = self.dispatcher.clone();
        let cancellation = self.cancellation.clone();
        let tasks = self.task_tracker.clone();
        self.task_tracker.spawn(async move {
            dispatcher.run_listener(listener, &tasks, cancellation).await;
        });

        self.spawn_http()?;

        self.task_tracker.close();

        Ok(())
    }

    fn spawn_http(&self) -> eyre::Result<()> {
        let state = hub_http::AppState {
            dispatcher: self.dispatcher.clone(),
            rate_limits: self.rate_limits.clone(),
            allowed_origins: self.config.allowed_origins.clone(),
            ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        };

        let address = format!("0.0.0.0:{}", self.config.api_port);
        let cancellation = self.cancellation.clone();

        self.task_tracker.spawn(hub_http::run_server(
            hub_http::ServerConfig { address },
            state,
            cancellation,
        ));

        Ok(())
    }

    async fn init_store(data_dir: &str) -> eyre::Result<SqliteStore> {
        let dir = Path::new(data_dir);
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .wrap_err_with(|| format!("failed to create data directory {data_dir:?}"))?;
        }

        let db_path = dir.join("hub.sqlite3");
        let connect_string = format!("sqlite://{}", db_path.display());

        SqliteStore::connect(&connect_string)
            .await
            .wrap_err("failed to open sqlite store")
    }

    fn load_signing_key(hex_private_key: &str) -> eyre::Result<SigningKey> {
        let bytes = hex::decode(hex_private_key).wrap_err("privateKey is not valid hex")?;
        let seed: [u8; 32] = bytes
            .get(..32)
            .wrap_err("privateKey must be at least 32 bytes")?
            .try_into()
            .wrap_err("privateKey seed must be exactly 32 bytes")?;

        Ok(SigningKey::from_bytes(&seed))
    }

    /// Logs every [`hub_types::events::DispatcherEvent`] at `info`, giving the
    /// hub's lifecycle transitions a visible trail without any component
    /// having to reach into the dispatcher's internals.
    fn spawn_event_logger(event_bus: &EventBus) {
        let receiver = event_bus.subscribe::<hub_types::events::DispatcherEvent>();

        tokio::spawn(async move {
            while let Ok(event) = receiver.recv().await {
                info!(?event, "dispatcher event");
            }
        });
    }

    pub async fn shutdown(&self) {
        info!("shutting down hub, draining in-flight work...");

        self.cancellation.cancel();

        let timeout = Duration::from_secs(self.config.shutdown_timeout_secs);

        select! {
            _ = self.task_tracker.wait() => {},
            _ = sleep(timeout) => {
                info!("shutdown timeout reached, exiting");
            },
        }
    }
}
