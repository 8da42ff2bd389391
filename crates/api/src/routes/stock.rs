//! Websocket feed of stock changes.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};

use crate::state::AppState;

/// GET /ws/stock: every stock change is pushed as
/// `{"type":"STOCK_UPDATE","item_id":..,"available_units":..}`.
pub async fn subscribe(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| session(socket, state))
}

async fn session(socket: WebSocket, state: Arc<AppState>) {
    let subscription = state.notifier.subscribe();
    let id = subscription.id;
    let mut updates = subscription.receiver;
    let (mut sink, mut stream) = socket.split();

    let mut push = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let text = match serde_json::to_string(&update) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to encode stock update");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Incoming frames are ignored; the loop only watches for the close.
    let mut drain = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            if matches!(message, Message::Close(_)) {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut push => drain.abort(),
        _ = &mut drain => push.abort(),
    }

    state.notifier.unsubscribe(id);
    tracing::debug!(session = %id, "Stock websocket closed");
}
