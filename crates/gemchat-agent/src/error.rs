use gemchat_store::StoreError;

use crate::provider::ProviderError;

/// Failures that end a chat request before any fragment is relayed.
///
/// None of these reach the client verbatim: the gateway reports every one of
/// them as the generic `stream_error` followed by `stream_end`.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid chat request: {0}")]
    InvalidRequest(String),

    #[error("persona resolution failed: {0}")]
    Resolution(#[from] StoreError),

    #[error("provider session failed: {0}")]
    Provider(#[from] ProviderError),
}
