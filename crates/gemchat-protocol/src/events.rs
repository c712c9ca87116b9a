// Realtime event names; must match the web client's socket handlers.

// client → server
pub const CHAT: &str = "chat";
pub const TEST: &str = "test";

// server → client
pub const NEW_CHUNK: &str = "new_chunk";
pub const STREAM_END: &str = "stream_end";
pub const STREAM_ERROR: &str = "stream_error";
pub const TEST_RESPONSE: &str = "test_response";

/// The only error text a client ever sees for a failed chat request.
pub const GENERIC_ERROR_MESSAGE: &str = "Internal server error occurred.";

pub const TEST_RESPONSE_MESSAGE: &str = "Test event received successfully!";
