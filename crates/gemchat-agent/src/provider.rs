use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use gemchat_core::types::Content;
use serde::Serialize;

/// Lazy, finite, non-restartable sequence of generated text fragments.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Everything a provider needs to open one conversational session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSpec {
    pub model: String,
    pub api_key: String,
    /// Attached only when a persona was resolved.
    pub system_instruction: Option<String>,
    /// Prior turns, oldest first, passed through verbatim.
    pub history: Vec<Content>,
}

/// Result of a one-shot, non-streaming generation.
/// Wire: `{ "totalTokens": 12, "text": "..." }`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub total_tokens: u64,
    pub text: String,
}

/// A generative-text backend (Gemini in production, fakes in tests).
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Provider name for logging and error messages.
    fn name(&self) -> &str;

    /// Bind a model, credential, optional system instruction and history into
    /// a session. No network traffic happens until the prompt is sent.
    async fn open_session(&self, spec: SessionSpec) -> Result<Box<dyn ChatSession>, ProviderError>;

    /// Single prompt, whole reply, with the token count reported by the API.
    async fn generate_text(
        &self,
        model: &str,
        api_key: &str,
        prompt: &str,
    ) -> Result<GenerateResponse, ProviderError>;
}

/// One-shot conversational context. Sending the prompt consumes the session,
/// so it cannot be streamed twice.
#[async_trait]
pub trait ChatSession: Send {
    async fn stream_prompt(self: Box<Self>, prompt: &str) -> Result<ChunkStream, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Prompt blocked: {0}")]
    Blocked(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("timed out waiting for {stage} after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },
}
