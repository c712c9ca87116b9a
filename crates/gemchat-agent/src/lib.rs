pub mod error;
pub mod gemini;
pub mod persona;
pub mod pipeline;
pub mod provider;
pub mod relay;
pub mod session;
pub mod stream;

pub use error::ChatError;
pub use pipeline::{ChatOutcome, ChatPipeline};
pub use provider::{ChatSession, GenerativeProvider, ProviderError};

#[cfg(test)]
mod testing;
