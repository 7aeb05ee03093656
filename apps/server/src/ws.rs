//! WebSocket transport for the broadcaster.
//!
//! Bridges one socket to a hub connection: outbound envelopes are
//! drained from the hub's channel and written as JSON text frames;
//! inbound text frames go to the hub's message handler. Either side
//! ending tears the pairing down and unregisters the connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::debug;

use crate::main_lib::AppState;

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let hub = state.coordinator.broadcaster().clone();
    let (connection_id, mut outbound) = hub.register();
    let (mut sink, mut stream) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(err) => {
                    debug!("Failed to encode outbound message: {}", err);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let inbound_hub = hub.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                Message::Text(text) => inbound_hub.handle_message(connection_id, text.as_str()),
                Message::Close(_) => break,
                // Pong/binary frames carry no protocol meaning here.
                _ => {}
            }
        }
    });

    // First task to finish wins; the other is cancelled.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.unregister(connection_id);
    debug!("Websocket connection {} closed", connection_id);
}
