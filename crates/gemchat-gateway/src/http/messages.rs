use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gemchat_store::types::{ChatroomMessage, NewMessage};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::ApiResult;

/// POST /chatroom-messages
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewMessage>,
) -> ApiResult<(StatusCode, Json<ChatroomMessage>)> {
    let msg = state.messages.create(new)?;
    Ok((StatusCode::CREATED, Json(msg)))
}

/// GET /chatroom-messages/{chatroom_id}: oldest first.
pub async fn list_by_chatroom(
    State(state): State<Arc<AppState>>,
    Path(chatroom_id): Path<String>,
) -> ApiResult<Json<Vec<ChatroomMessage>>> {
    Ok(Json(state.messages.list_by_chatroom(&chatroom_id)?))
}
