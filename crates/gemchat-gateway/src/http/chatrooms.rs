use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gemchat_store::types::{Chatroom, ChatroomUpdate, NewChatroom};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Chatroom>>> {
    Ok(Json(state.chatrooms.list()?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewChatroom>,
) -> ApiResult<(StatusCode, Json<Chatroom>)> {
    let room = state.chatrooms.create(new)?;
    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Chatroom>> {
    state
        .chatrooms
        .get(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("chatroom", &id))
}

/// PUT /chatrooms/{id}: `persona_ids`, when given, replaces the enrollments.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<ChatroomUpdate>,
) -> ApiResult<Json<Chatroom>> {
    Ok(Json(state.chatrooms.update(&id, update)?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.chatrooms.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
