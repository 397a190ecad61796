//! `WebSocket` handler for overlay change streaming.
//!
//! Clients connect to `GET /ws/overlays` and receive a JSON-encoded
//! [`OverlayEvent`](infra_types::OverlayEvent) each time the overlay
//! registry creates or extends an overlay. Map clients add an `attached`
//! overlay to the map once and refresh it on `appended`.
//!
//! A client that falls behind skips the lagged events and resumes from
//! the most recent one.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming overlay events.
///
/// # Route
///
/// `GET /ws/overlays`
pub async fn ws_overlays(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("overlay stream client connected");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!("failed to serialize overlay event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("overlay stream client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(skipped = n, "overlay stream client lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!("overlay channel closed, shutting down stream");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("overlay stream client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("overlay stream error: {e}");
                        return;
                    }
                    // Client-sent text and binary frames carry no commands.
                    _ => {}
                }
            }
        }
    }
}
