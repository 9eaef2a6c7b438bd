// WebSocket handler: one player session per connection.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

use super::AppState;
use crate::metrics;

/// WebSocket upgrade handler for a game session.
pub async fn ws_game(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    metrics::CONNECTED_WEBSOCKETS.inc();
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before registering so no update between init and the loop is missed.
    let mut rx = state.game_server.subscribe();
    let (player_id, init) = match state.game_server.connect().await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!("Failed to register session: {e}");
            metrics::CONNECTED_WEBSOCKETS.dec();
            return;
        }
    };

    if sender.send(Message::Text(init.into())).await.is_ok() {
        loop {
            tokio::select! {
                result = rx.recv() => {
                    match result {
                        Ok(msg) => {
                            if sender.send(Message::Text(msg.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(%player_id, "WebSocket client lagged, skipped {n} messages");
                        }
                    }
                }
                result = receiver.next() => {
                    match result {
                        Some(Ok(Message::Text(text))) => {
                            if state.game_server.submit(&player_id, text.to_string()).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Binary(bytes))) => {
                            tracing::warn!(%player_id, len = bytes.len(), "Ignoring binary frame");
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        // Pings are answered by axum
                        Some(Ok(_)) => {}
                    }
                }
            }
        }
    }

    if let Err(e) = state.game_server.disconnect(&player_id) {
        tracing::warn!(%player_id, "Disconnect not delivered: {e}");
    }
    metrics::CONNECTED_WEBSOCKETS.dec();
}
