use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{stream::SplitSink, SinkExt};
use gemchat_agent::stream::{RelayEvent, RelaySink, SinkClosed};
use gemchat_protocol::ServerEvent;
use tracing::debug;

/// Write half of a WS connection, shared by the read loop and every chat
/// task running on that connection. Each frame is written under the lock.
pub type SharedSink = Arc<tokio::sync::Mutex<SplitSink<WebSocket, Message>>>;

/// Serialize a server event and send it over the shared WS connection.
pub async fn event_shared(tx: &SharedSink, event: &ServerEvent) -> Result<(), axum::Error> {
    let mut guard = tx.lock().await;
    guard.send(Message::Text(event.to_json().into())).await
}

/// Wire form of a relay event.
pub fn server_event(event: RelayEvent) -> ServerEvent {
    match event {
        RelayEvent::Chunk { text } => ServerEvent::chunk(text),
        RelayEvent::Error => ServerEvent::error(),
        RelayEvent::End => ServerEvent::end(),
    }
}

/// Relay sink bound to one connection.
pub struct WsRelaySink {
    conn_id: String,
    tx: SharedSink,
}

impl WsRelaySink {
    pub fn new(conn_id: impl Into<String>, tx: SharedSink) -> Self {
        Self {
            conn_id: conn_id.into(),
            tx,
        }
    }
}

#[async_trait]
impl RelaySink for WsRelaySink {
    async fn emit(&self, event: RelayEvent) -> Result<(), SinkClosed> {
        let event = server_event(event);
        event_shared(&self.tx, &event).await.map_err(|e| {
            debug!(conn_id = %self.conn_id, event = event.name(), error = %e, "WS send failed");
            SinkClosed
        })
    }
}
