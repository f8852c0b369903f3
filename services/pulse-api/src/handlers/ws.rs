//! WebSocket fan-out of snapshot updates.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use metrics::{counter, gauge};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::state::AppState;

/// GET /ws/stream - push each new snapshot to the client
pub async fn ws_stream(
    ws: WebSocketUpgrade,
    Extension(state): Extension<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    counter!("ws_connections_total").increment(1);
    gauge!("ws_clients").increment(1.0);
    info!("WebSocket client connected");

    // New clients get the current state immediately
    if let Some(snapshot) = state.latest_snapshot().await {
        let message = AppState::update_message(&snapshot);
        if socket.send(Message::Text(message)).await.is_err() {
            gauge!("ws_clients").decrement(1.0);
            return;
        }
    }

    let mut updates = state.updates.subscribe();

    loop {
        tokio::select! {
            update = updates.recv() => {
                match update {
                    Ok(message) => {
                        if socket.send(Message::Text(message)).await.is_err() {
                            break;
                        }
                    }
                    // Slow consumer: skip to the newest pending update
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped = skipped, "WebSocket client lagged behind updates");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text == "ping" => {
                        if socket.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    gauge!("ws_clients").decrement(1.0);
    info!("WebSocket client disconnected");
}
