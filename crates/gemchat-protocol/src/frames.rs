use gemchat_core::types::ChatRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events;

/// Raw inbound frame: read the `event` discriminator first, then the body.
/// Wire: `{ "event": "chat", "data": {...} }`
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    pub event: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// A client event the gateway knows how to handle.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Chat(ChatRequest),
    Test(Value),
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("invalid '{event}' payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl InboundFrame {
    /// Interpret the frame body according to its event name.
    pub fn into_event(self) -> Result<ClientEvent, FrameError> {
        match self.event.as_str() {
            events::CHAT => {
                let data = self.data.unwrap_or(Value::Null);
                serde_json::from_value(data)
                    .map(ClientEvent::Chat)
                    .map_err(|source| FrameError::InvalidPayload {
                        event: self.event,
                        source,
                    })
            }
            events::TEST => Ok(ClientEvent::Test(self.data.unwrap_or(Value::Null))),
            _ => Err(FrameError::UnknownEvent(self.event)),
        }
    }
}

/// Server → client push event.
/// Wire: `{ "event": "new_chunk", "data": { "text": "Hel" } }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewChunk { text: String },
    StreamEnd {},
    StreamError { message: String },
    TestResponse { message: String },
}

impl ServerEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::NewChunk { text: text.into() }
    }

    pub fn end() -> Self {
        Self::StreamEnd {}
    }

    /// The generic, user-safe error event.
    pub fn error() -> Self {
        Self::StreamError {
            message: events::GENERIC_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn test_response() -> Self {
        Self::TestResponse {
            message: events::TEST_RESPONSE_MESSAGE.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NewChunk { .. } => events::NEW_CHUNK,
            Self::StreamEnd {} => events::STREAM_END,
            Self::StreamError { .. } => events::STREAM_ERROR,
            Self::TestResponse { .. } => events::TEST_RESPONSE,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
