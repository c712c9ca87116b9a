use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gemchat_agent::ProviderError;
use gemchat_protocol::events::GENERIC_ERROR_MESSAGE;
use gemchat_store::StoreError;
use serde::Serialize;
use tracing::warn;

/// Error body for every REST endpoint.
/// Wire: `{ "error": "..." }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// A failed REST call: status code plus the message shown to the caller.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("{entity} not found: {id}"),
        }
    }

    /// Details go to the log, never to the caller.
    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid { .. } | StoreError::Constraint(_) => Self::bad_request(e.to_string()),
            StoreError::NotFound { entity, id } => Self::not_found(entity, &id),
            StoreError::Database(ref inner) => {
                warn!(error = %inner, "database error");
                Self::internal()
            }
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(e: ProviderError) -> Self {
        warn!(error = %e, "Gemini request failed");
        Self::internal()
    }
}
