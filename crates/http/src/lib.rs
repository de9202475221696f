//! The hub's HTTP/WebSocket front door: the OpenAI-shaped streaming
//! completions endpoint, the stats WebSocket, and an ambient liveness probe.

pub mod chat;
pub mod error;
pub mod health;
pub mod state;
pub mod ws;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

pub struct ServerConfig {
    /// Address the HTTP/WebSocket front door binds to.
    pub address: String,
}

fn build_router(state: AppState) -> Router {
    let cors = if state.allowed_origins.iter().any(|origin| origin == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
    } else {
        let origins: Vec<_> = state
            .allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_credentials(true)
    };

    Router::new()
        .route("/v1/chat/completions", post(chat::chat_completions))
        .route("/ws", get(ws::stats_ws))
        .route("/healthz", get(health::healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the HTTP front door until `cancellation` fires.
pub async fn run_server(
    ServerConfig { address }: ServerConfig,
    state: AppState,
    cancellation: CancellationToken,
) -> eyre::Result<()> {
    let ready = state.ready.clone();
    let app = build_router(state);
    let listener = TcpListener::bind(&address).await?;

    ready.store(true, std::sync::atomic::Ordering::Relaxed);
    tracing::info!(%address, "http front door listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancellation.cancelled().await;
        tracing::info!("http front door shutting down");
    })
    .await?;

    Ok(())
}
