use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use dashmap::DashMap;
use gemchat_agent::{ChatPipeline, GenerativeProvider};
use gemchat_store::{ApiKeyRepo, ChatroomRepo, MessageRepo, PersonaRepo};
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::http;

/// Central shared state, passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub chat: ChatPipeline,
    pub provider: Arc<dyn GenerativeProvider>,
    pub api_keys: ApiKeyRepo,
    /// Shared with the chat pipeline's persona resolver.
    pub personas: Arc<PersonaRepo>,
    pub chatrooms: ChatroomRepo,
    pub messages: MessageRepo,
    /// Active WS connections: conn_id -> token cancelled when it closes.
    pub ws_clients: DashMap<String, CancellationToken>,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(http::health::health_handler))
        .route("/ws", get(crate::ws::connection::ws_handler))
        .route("/gemini", get(http::gemini::hello))
        .route("/gemini/text", post(http::gemini::generate_text))
        .route(
            "/api_keys",
            get(http::api_keys::list).post(http::api_keys::create),
        )
        .route("/api_keys/{api_key}", delete(http::api_keys::remove))
        .route(
            "/personas",
            get(http::personas::list).post(http::personas::create),
        )
        .route(
            "/personas/{id}",
            get(http::personas::get_one)
                .put(http::personas::update)
                .delete(http::personas::remove),
        )
        .route(
            "/chatrooms",
            get(http::chatrooms::list).post(http::chatrooms::create),
        )
        .route(
            "/chatrooms/{id}",
            get(http::chatrooms::get_one)
                .put(http::chatrooms::update)
                .delete(http::chatrooms::remove),
        )
        .route("/chatroom-messages", post(http::messages::create))
        .route(
            "/chatroom-messages/{chatroom_id}",
            get(http::messages::list_by_chatroom),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
