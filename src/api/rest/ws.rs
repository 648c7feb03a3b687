use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::auth::{Identity, verify_token};
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

/// Opens the long-lived real-time channel. The credential is verified before
/// the upgrade; the session then receives every domain event until the
/// transport closes.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let identity = verify_token(&query.token, &state.config.auth_secret)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, identity)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: Identity) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.bus.subscribe();

    let mut keepalive =
        tokio::time::interval(Duration::from_secs(state.config.keepalive_interval_secs));
    keepalive.tick().await;

    state.metrics.ws_sessions.inc();
    info!(user_id = %identity.user_id, role = ?identity.role, "websocket client connected");

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(err) => {
                            warn!(error = %err, "failed to serialize event for ws");
                            continue;
                        }
                    };

                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                // Events dropped while this session lagged are not
                // redelivered; the client reloads on reconnect.
                Err(RecvError::Lagged(skipped)) => {
                    warn!(user_id = %identity.user_id, skipped, "session lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            _ = keepalive.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => match msg {
                Some(Ok(Message::Text(text))) if text == "ping" => {
                    if sender.send(Message::Text("pong".to_string())).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            }
        }
    }

    state.metrics.ws_sessions.dec();
    info!(user_id = %identity.user_id, "websocket client disconnected");
}
