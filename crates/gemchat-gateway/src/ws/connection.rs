use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use gemchat_core::config::MAX_PAYLOAD_BYTES;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::app::AppState;
use crate::ws::{message, send};

/// Axum handler: upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection event loop, lives for the entire WS session.
///
/// Chat tasks spawned from here share the connection's cancellation token;
/// it is cancelled when the client leaves or the server shuts down, which
/// drops any in-flight provider streams.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "new WS connection");

    let cancel = CancellationToken::new();
    state.ws_clients.insert(conn_id.clone(), cancel.clone());

    let (tx, mut rx) = socket.split();
    let shared_tx: send::SharedSink = Arc::new(tokio::sync::Mutex::new(tx));

    loop {
        tokio::select! {
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_PAYLOAD_BYTES {
                            warn!(conn_id, size = text.len(), "payload too large");
                            break;
                        }
                        message::handle(&conn_id, text.as_str(), &shared_tx, &state, &cancel).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let mut guard = shared_tx.lock().await;
                        let _ = guard.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(conn_id, error = %e, "WS read failed");
                        break;
                    }
                    _ => {}
                }
            }

            _ = cancel.cancelled() => break,
        }
    }

    cancel.cancel();
    state.ws_clients.remove(&conn_id);
    info!(conn_id, "WS connection closed");
}
