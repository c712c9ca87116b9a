pub mod api_keys;
pub mod chatrooms;
pub mod error;
pub mod gemini;
pub mod health;
pub mod messages;
pub mod personas;
