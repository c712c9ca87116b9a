use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use gemchat_core::types::Persona;
use gemchat_store::types::{NewPersona, PersonaUpdate};
use std::sync::Arc;

use crate::app::AppState;
use crate::http::error::{ApiError, ApiResult};

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Persona>>> {
    Ok(Json(state.personas.list()?))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewPersona>,
) -> ApiResult<(StatusCode, Json<Persona>)> {
    let persona = state.personas.create(new)?;
    Ok((StatusCode::CREATED, Json(persona)))
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Persona>> {
    state
        .personas
        .get(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("persona", &id))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(update): Json<PersonaUpdate>,
) -> ApiResult<Json<Persona>> {
    Ok(Json(state.personas.update(&id, update)?))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.personas.delete(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
