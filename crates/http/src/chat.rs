use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;

use hub_dispatcher::registry::Registry;
use hub_dispatcher::{ResponderEvent, ResponderSink};
use hub_p2p::PeerHandle;
use hub_storage::PeerStore;
use hub_types::frame::{ChatMessage, Frame, InferencePayload};
use hub_types::{HTTP_RATE_LIMIT_WINDOW_MINUTES, MAX_HTTP_REQUESTS};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRequest {
    model_name: String,
    #[serde(default)]
    #[allow(dead_code)]
    preferred_provider_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InferenceData {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatCompletionsRequest {
    session_request: SessionRequest,
    data: InferenceData,
}

/// Relays the chosen provider's raw bytes to the HTTP client as they arrive,
/// and unregisters the pending responder the moment the client goes away —
/// whether that's a normal stream end or the axum body future being dropped
/// mid-flight.
struct ResponderGuard {
    peer_key: String,
    registry: Registry,
    inner: ReceiverStream<ResponderEvent>,
}

impl Stream for ResponderGuard {
    type Item = ResponderEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}

impl Drop for ResponderGuard {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        let peer_key = std::mem::take(&mut self.peer_key);
        tokio::spawn(async move {
            registry.remove_responder(&peer_key).await;
        });
    }
}

fn client_ip(headers: &HeaderMap, remote: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| remote.ip().to_string())
}

fn closed_stream() -> Response {
    Sse::new(futures::stream::empty::<Result<Event, std::convert::Infallible>>()).into_response()
}

fn no_peers_stream() -> Response {
    let event = Event::default().data(r#"{"error":"No peers available"}"#);
    Sse::new(futures::stream::once(async move {
        Ok::<_, std::convert::Infallible>(event)
    }))
    .into_response()
}

/// `POST /v1/chat/completions`: rate-limits by client IP, matches a provider
/// for the requested model, registers this response as the provider's
/// pending responder, and streams whatever bytes the provider sends back as
/// SSE until `inferenceEnded` or the provider disconnects.
pub async fn chat_completions(
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<ChatCompletionsRequest>,
) -> Result<Response, ApiError> {
    let ip = client_ip(&headers, remote);

    if let Some((count, _)) = state
        .rate_limits
        .get(&ip, HTTP_RATE_LIMIT_WINDOW_MINUTES)
        .await?
    {
        if count >= MAX_HTTP_REQUESTS {
            return Err(ApiError::RateLimited);
        }
    }
    state.rate_limits.record(&ip).await?;

    let stores = state.dispatcher.stores();
    let Some(provider) = stores
        .peers
        .get_random(&req.session_request.model_name)
        .await?
    else {
        return Ok(no_peers_stream());
    };

    let registry = state.dispatcher.registry();
    let Some(handle) = registry.handle_for(&provider.key).await else {
        return Ok(closed_stream());
    };

    let (sink, rx) = ResponderSink::channel();
    if !registry.register_responder(&provider.key, sink).await {
        return Ok(closed_stream());
    }

    let inference = Frame::Inference(InferencePayload {
        messages: req.data.messages,
        key: provider.key.clone(),
    });

    if handle.send(inference).await.is_err() {
        registry.remove_responder(&provider.key).await;
        return Ok(closed_stream());
    }

    let guard = ResponderGuard {
        peer_key: provider.key.clone(),
        registry: registry.clone(),
        inner: ReceiverStream::new(rx),
    };

    let sse_stream = guard.map(|event| {
        let sse_event = match event {
            ResponderEvent::Chunk(bytes) => {
                Event::default().data(String::from_utf8_lossy(&bytes).into_owned())
            }
            ResponderEvent::End => Event::default().data(""),
            ResponderEvent::Error(message) => Event::default().event("error").data(message),
        };
        Ok::<_, std::convert::Infallible>(sse_event)
    });

    Ok(Sse::new(sse_stream).into_response())
}
