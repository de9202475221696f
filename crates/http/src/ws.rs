use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::{IntoResponse, Response};

use hub_storage::{PeerStore, ProviderSessionStore};
use hub_types::StatsSnapshot;

use crate::state::AppState;

const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

pub async fn stats_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run(socket, state))
}

async fn run(mut socket: WebSocket, state: AppState) {
    if !send_snapshot(&mut socket, &state).await {
        return;
    }

    let mut ticker = tokio::time::interval(SNAPSHOT_INTERVAL);
    ticker.tick().await; // already sent one snapshot above

    loop {
        ticker.tick().await;
        if !send_snapshot(&mut socket, &state).await {
            return;
        }
    }
}

async fn send_snapshot(socket: &mut WebSocket, state: &AppState) -> bool {
    let snapshot = match build_snapshot(state).await {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::error!(%err, "failed to build stats snapshot");
            return true; // transient store hiccup, keep the socket alive for the next tick
        }
    };

    let Ok(body) = serde_json::to_string(&snapshot) else {
        return true;
    };

    socket.send(Message::Text(body)).await.is_ok()
}

async fn build_snapshot(state: &AppState) -> hub_storage::StoreResult<StatsSnapshot> {
    let stores = state.dispatcher.stores();
    let entries = stores.peers.get_all().await?;
    let stats = stores.provider_sessions.stats().await?;

    let active_peers = entries.iter().filter(|e| e.peer.online).count() as i64;

    let mut active_models: Vec<String> = entries
        .iter()
        .filter(|e| e.peer.online)
        .map(|e| e.peer.model_name.clone())
        .collect();
    active_models.sort();
    active_models.dedup();

    Ok(StatsSnapshot {
        unique_peer_count: entries.len() as i64,
        active_peers,
        active_models,
        all_peers: entries.into_iter().map(|e| e.peer).collect(),
        stats,
    })
}
