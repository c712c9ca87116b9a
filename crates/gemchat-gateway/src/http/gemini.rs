//! Non-streaming Gemini endpoints.
//!
//! `GET /gemini` is a smoke check. `POST /gemini/text` runs one prompt
//! against the configured default model and credential.
//!
//! Request:  `{"prompt": "hello"}`
//! Response: `{"totalTokens": 12, "text": "..."}`

use axum::{extract::State, Json};
use gemchat_agent::provider::GenerateResponse;
use serde::Deserialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct GenerateTextBody {
    pub prompt: String,
}

/// GET /gemini
pub async fn hello() -> &'static str {
    "Hello, Gemini!"
}

/// POST /gemini/text
pub async fn generate_text(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GenerateTextBody>,
) -> ApiResult<Json<GenerateResponse>> {
    if body.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt cannot be empty"));
    }

    let settings = state.chat.sessions().settings();
    let resp = state
        .provider
        .generate_text(
            &settings.default_model,
            &settings.default_api_key,
            &body.prompt,
        )
        .await?;
    Ok(Json(resp))
}
