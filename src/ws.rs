use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tower_http::trace::TraceLayer;

use crate::broadcast::dispatch;
use crate::error::RelayError;
use crate::state::registry::OUTBOUND_CAPACITY;
use crate::state::AppState;
use crate::types::ConnectionId;

/// Build the relay router. Clients may connect on `/` or `/ws`.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound, mut queue) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);
    let id: ConnectionId = ulid::Ulid::new().to_string();

    // Writer task: drains this connection's queue. When it exits the queue
    // closes, which is what marks the connection as no longer open.
    let writer_id = id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = queue.recv().await {
            if sender.send(msg).await.is_err() {
                tracing::debug!(connection = %writer_id, "WebSocket send failed");
                break;
            }
        }
    });

    state.registry.register(id.clone(), outbound.clone()).await;
    tracing::info!(connection = %id, "WebSocket connected");

    // Handle incoming messages
    loop {
        tokio::select! {
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        relay(&state, &id, text.as_str().as_bytes()).await;
                    }
                    Some(Ok(Message::Binary(data))) => relay(&state, &id, &data).await,
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(TrySendError::Closed(_)) = outbound.try_send(Message::Pong(data)) {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(connection = %id, "WebSocket closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(connection = %id, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut send_task => {
                tracing::debug!(connection = %id, "Writer task ended");
                break;
            }
        }
    }

    // Remove before anything else can pick this connection as a target
    let role = state.registry.remove(&id).await;
    send_task.abort();
    tracing::info!(connection = %id, ?role, "WebSocket connection closed");
}

async fn relay(state: &AppState, id: &str, payload: &[u8]) {
    match dispatch(&state.registry, id, payload).await {
        Ok(outcome) => tracing::trace!(connection = %id, ?outcome, "Message handled"),
        Err(e @ RelayError::MalformedMessage(_)) => {
            tracing::warn!(connection = %id, "Dropping message: {}", e);
        }
        Err(e) => tracing::error!(connection = %id, "Dispatch failed: {}", e),
    }
}
