use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gemchat_store::types::{ApiKey, NewApiKey};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::ApiResult;

/// GET /api_keys
pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ApiKey>>> {
    Ok(Json(state.api_keys.list()?))
}

/// POST /api_keys
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewApiKey>,
) -> ApiResult<(StatusCode, Json<ApiKey>)> {
    let key = state.api_keys.create(new)?;
    Ok((StatusCode::CREATED, Json(key)))
}

/// DELETE /api_keys/{api_key}: fails while a persona still uses the key.
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(api_key): Path<String>,
) -> ApiResult<StatusCode> {
    state.api_keys.delete_by_key(&api_key)?;
    Ok(StatusCode::NO_CONTENT)
}
