pub mod config;
pub mod error;
pub mod types;

pub use config::GemchatConfig;
pub use error::{GemchatError, Result};
