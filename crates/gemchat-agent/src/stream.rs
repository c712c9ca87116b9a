use async_trait::async_trait;

/// Events a relay pushes to the client connection for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// One non-empty generated fragment.
    Chunk { text: String },

    /// The request failed. The client only ever sees a fixed, user-safe
    /// message; details stay in the log. Always followed by `End`.
    Error,

    /// Terminal event of every request.
    End,
}

/// The connection went away; nothing more can be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("client connection closed")]
pub struct SinkClosed;

/// Where relayed events go. The gateway implements this over the WebSocket
/// write half; tests collect into a Vec.
#[async_trait]
pub trait RelaySink: Send + Sync {
    async fn emit(&self, event: RelayEvent) -> Result<(), SinkClosed>;
}

/// Parse a single SSE line.
/// SSE format: `event: <type>\ndata: <json>\n\n`
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event:") {
        Some(SseParsed::Event(event_type.trim_start().to_string()))
    } else {
        line.strip_prefix("data:")
            .map(|data| SseParsed::Data(data.trim_start().to_string()))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_and_event_lines() {
        assert_eq!(
            parse_sse_line("data: {\"a\":1}"),
            Some(SseParsed::Data("{\"a\":1}".to_string()))
        );
        assert_eq!(
            parse_sse_line("data:{}"),
            Some(SseParsed::Data("{}".to_string()))
        );
        assert_eq!(
            parse_sse_line("event: message"),
            Some(SseParsed::Event("message".to_string()))
        );
    }

    #[test]
    fn comments_and_other_fields_are_ignored() {
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("id: 7"), None);
        assert_eq!(parse_sse_line(""), None);
    }
}
