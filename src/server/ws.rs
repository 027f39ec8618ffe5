//! WebSocket observer endpoint.
//!
//! Each connection becomes one hub observer: the socket first receives the
//! full transcript history as individual JSON text frames in sequence
//! order, then every new entry as it is recorded. Observers are
//! listen-only; inbound frames are drained and ignored until the peer
//! closes.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};

use crate::server::routes::AppState;

/// GET /ws — upgrade to the observer stream.
pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let handle = state.hub.subscribe();
    let observer_id = handle.id;
    let mut receiver = handle.receiver;
    tracing::debug!("websocket observer {observer_id} connected");

    let (mut sink, mut stream) = socket.split();

    let mut forward = tokio::spawn(async move {
        while let Some(entry) = receiver.recv().await {
            let frame = match serde_json::to_string(&entry) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("failed to serialize entry {}: {e}", entry.sequence);
                    continue;
                }
            };
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut drain = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    // Either side ending tears the connection down.
    tokio::select! {
        _ = &mut forward => drain.abort(),
        _ = &mut drain => forward.abort(),
    }

    state.hub.unsubscribe(observer_id);
    tracing::debug!("websocket observer {observer_id} disconnected");
}
