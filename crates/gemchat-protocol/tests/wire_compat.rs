// Verify wire format matches what the web client's socket handlers expect.

use gemchat_core::types::{Content, Role};
use gemchat_protocol::frames::{ClientEvent, FrameError, InboundFrame, ServerEvent};

#[test]
fn chat_frame_parses_full_payload() {
    let json = r#"{
        "event": "chat",
        "data": {
            "prompt": "Hello",
            "history": [{"role": "user", "parts": [{"text": "earlier"}]}],
            "model": "gemini-2.0-flash",
            "api_key": "AIza-123",
            "mentioned_persona_ids": ["p1"]
        }
    }"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();

    match frame.into_event().unwrap() {
        ClientEvent::Chat(req) => {
            assert_eq!(req.prompt, "Hello");
            assert_eq!(req.model, "gemini-2.0-flash");
            assert_eq!(req.credential(), Some("AIza-123"));
            assert_eq!(req.mentions().to_vec(), vec!["p1".to_string()]);
            assert_eq!(req.history.len(), 1);
            assert_eq!(req.history[0].role, Role::User);
            assert_eq!(req.history[0], Content::user("earlier"));
        }
        other => panic!("expected chat event, got {other:?}"),
    }
}

#[test]
fn chat_frame_without_prompt_is_invalid() {
    let json = r#"{"event":"chat","data":{"model":"gemini-2.0-flash"}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert!(matches!(
        frame.into_event(),
        Err(FrameError::InvalidPayload { .. })
    ));
}

#[test]
fn unknown_event_is_reported() {
    let frame: InboundFrame = serde_json::from_str(r#"{"event":"nope"}"#).unwrap();
    assert!(matches!(frame.into_event(), Err(FrameError::UnknownEvent(e)) if e == "nope"));
}

#[test]
fn test_frame_accepts_missing_data() {
    let frame: InboundFrame = serde_json::from_str(r#"{"event":"test"}"#).unwrap();
    assert!(matches!(frame.into_event(), Ok(ClientEvent::Test(_))));
}

#[test]
fn new_chunk_serialization() {
    let json = ServerEvent::chunk("Hel").to_json();
    assert_eq!(json, r#"{"event":"new_chunk","data":{"text":"Hel"}}"#);
}

#[test]
fn stream_end_has_empty_payload() {
    let json = ServerEvent::end().to_json();
    assert_eq!(json, r#"{"event":"stream_end","data":{}}"#);
}

#[test]
fn stream_error_is_generic() {
    let ev = ServerEvent::error();
    assert_eq!(ev.name(), "stream_error");
    assert_eq!(
        ev.to_json(),
        r#"{"event":"stream_error","data":{"message":"Internal server error occurred."}}"#
    );
}

#[test]
fn test_response_acknowledges() {
    assert_eq!(
        ServerEvent::test_response().to_json(),
        r#"{"event":"test_response","data":{"message":"Test event received successfully!"}}"#
    );
}
