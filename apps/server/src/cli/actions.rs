use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tokio::select;
use tokio::signal::unix;
use tokio::signal::unix::SignalKind;
use tracing::{level_filters::LevelFilter, Event, Level, Subscriber};
use tracing_subscriber::{
    filter::Targets,
    fmt::format::{DefaultVisitor, Writer},
    layer::Layer,
    prelude::*,
    util::SubscriberInitExt,
    EnvFilter,
};

use hub_storage::{PeerStore, SqliteStore};
use hub_types::HubConfig;

use crate::cli::node::Hub;

pub async fn start(config_path: PathBuf) -> eyre::Result<()> {
    let config = HubConfig::from_path(&config_path)?;
    init_tracing(&config.log_level)?;

    tracing::info!(
        path = %config.path,
        api_port = config.api_port,
        p2p_bind_addr = %config.p2p_bind_addr,
        min_peer_version = %config.min_peer_version,
        "starting hub"
    );

    let hub = Arc::new(Hub::new(config).await?);
    let hub_clone = hub.clone();

    tokio::spawn(async move {
        if let Err(err) = hub_clone.run().await {
            tracing::error!(%err, "hub run failed");
        }
        hub_clone.task_tracker.close();
    });

    let mut sigterm =
        unix::signal(SignalKind::terminate()).expect("failed to create SIGTERM signal handler");
    let mut sigint =
        unix::signal(SignalKind::interrupt()).expect("failed to create SIGINT signal handler");

    select! {
        _ = hub.cancelled() => {
            tracing::info!("hub cancelled itself");
        }
        _ = sigterm.recv() => {
            tracing::info!("received SIGTERM signal");
        }
        _ = sigint.recv() => {
            tracing::info!("received SIGINT signal");
        }
    }

    hub.shutdown().await;

    Ok(())
}

pub async fn delete_peer(config_path: PathBuf, key: String) -> eyre::Result<()> {
    let config = HubConfig::from_path(&config_path)?;

    let db_path = format!("sqlite://{}/hub.sqlite3", config.path);
    let store = SqliteStore::connect(&db_path).await?;

    if store.delete(&key).await? {
        println!("deleted peer {key}");
    } else {
        println!("peer {key} not found");
    }

    Ok(())
}

fn init_tracing(level: &str) -> eyre::Result<()> {
    let level_filter = Level::from_str(level).unwrap_or(Level::INFO);

    let filter = Targets::new()
        .with_target("hub_dispatcher", level_filter)
        .with_target("hub_http", level_filter)
        .with_target("hub_storage", level_filter)
        .with_target("hub_p2p", level_filter)
        .with_target("hub_types", level_filter)
        .with_default(level_filter);

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?
        .add_directive("hyper_util=info".parse()?);

    tracing_subscriber::registry()
        .with(HubTracer.with_filter(filter))
        .with(env_filter)
        .try_init()?;

    Ok(())
}

struct HubTracer;

impl<S> Layer<S> for HubTracer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let target = match event.metadata().level() {
            &Level::INFO | &Level::WARN | &Level::ERROR => {
                event.metadata().target().split("::").last().unwrap_or_default()
            }
            _ => event.metadata().target(),
        };

        print!(
            "[{}] {} {}: ",
            chrono::offset::Local::now().format("%Y-%m-%d %H:%M:%S"),
            event.metadata().level(),
            target,
        );

        let mut message = String::new();
        event.record(&mut DefaultVisitor::new(Writer::new(&mut message), true));

        println!("{}", message);
    }
}
