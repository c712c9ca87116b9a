use std::sync::Arc;

use gemchat_agent::relay::RelayOutcome;
use gemchat_agent::stream::{RelayEvent, RelaySink};
use gemchat_protocol::{events, ClientEvent, FrameError, InboundFrame, ServerEvent};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::send::{self, SharedSink, WsRelaySink};

/// Process one inbound WS text frame.
///
/// `chat` runs on its own task so a long generation never blocks the read
/// loop; several chats on one connection may stream at the same time.
pub async fn handle(
    conn_id: &str,
    text: &str,
    tx: &SharedSink,
    app: &Arc<AppState>,
    cancel: &CancellationToken,
) {
    let event = match parse(conn_id, text) {
        Inbound::Event(event) => event,
        Inbound::BadChat => {
            reject_chat(&WsRelaySink::new(conn_id, Arc::clone(tx))).await;
            return;
        }
        Inbound::Ignored => return,
    };

    match event {
        ClientEvent::Chat(request) => {
            let app = Arc::clone(app);
            let sink = WsRelaySink::new(conn_id, Arc::clone(tx));
            let cancel = cancel.clone();
            let conn_id = conn_id.to_string();
            tokio::spawn(async move {
                let outcome = app.chat.handle(request, &sink, &cancel).await;
                let persona_ids = outcome.persona_ids;
                match outcome.relay {
                    RelayOutcome::Completed { chunks } => {
                        info!(conn_id = %conn_id, chunks, ?persona_ids, "chat stream completed")
                    }
                    RelayOutcome::Failed { chunks } => {
                        warn!(conn_id = %conn_id, chunks, ?persona_ids, "chat stream failed")
                    }
                    RelayOutcome::Cancelled => debug!(conn_id = %conn_id, "chat stream cancelled"),
                }
            });
        }
        ClientEvent::Test(data) => {
            debug!(conn_id, %data, "test event");
            let _ = send::event_shared(tx, &ServerEvent::test_response()).await;
        }
    }
}

#[derive(Debug)]
enum Inbound {
    Event(ClientEvent),
    /// A `chat` frame whose body is not a valid request. The client is
    /// waiting on a stream, so it gets the error pair.
    BadChat,
    /// Not JSON, or an event we do not know.
    Ignored,
}

fn parse(conn_id: &str, text: &str) -> Inbound {
    let frame: InboundFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id, error = %e, "malformed frame");
            return Inbound::Ignored;
        }
    };
    match frame.into_event() {
        Ok(event) => Inbound::Event(event),
        Err(e) if is_chat(&e) => {
            warn!(conn_id, error = %e, "invalid chat request");
            Inbound::BadChat
        }
        Err(e) => {
            warn!(conn_id, error = %e, "frame ignored");
            Inbound::Ignored
        }
    }
}

fn is_chat(e: &FrameError) -> bool {
    matches!(e, FrameError::InvalidPayload { event, .. } if event == events::CHAT)
}

/// Generic error then end, as for any other failed chat.
async fn reject_chat(sink: &dyn RelaySink) {
    if sink.emit(RelayEvent::Error).await.is_ok() {
        let _ = sink.emit(RelayEvent::End).await;
    }
}
