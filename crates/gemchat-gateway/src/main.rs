use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dashmap::DashMap;
use gemchat_agent::gemini::GeminiProvider;
use gemchat_agent::persona::PersonaResolver;
use gemchat_agent::relay::StreamRelay;
use gemchat_agent::session::{GeminiSettings, SessionFactory};
use gemchat_agent::{ChatPipeline, GenerativeProvider};
use gemchat_core::config::GemchatConfig;
use gemchat_store::{db, ApiKeyRepo, ChatroomRepo, MessageRepo, PersonaRepo};
use tracing::info;

mod app;
mod http;
mod ws;

#[derive(Parser)]
#[command(name = "gemchat-gateway", version, about = "Gemini chat gateway")]
struct Cli {
    /// Path to gemchat.toml (default: $GEMCHAT_CONFIG, then ~/.gemchat/gemchat.toml)
    #[arg(long, env = "GEMCHAT_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "gemchat_gateway=info,gemchat_agent=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = GemchatConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        GemchatConfig::default()
    });

    // no default credential, no server
    let settings = GeminiSettings::from_config(&config.gemini)?;
    info!(
        model = %settings.default_model,
        allowed = settings.allowed_models.len(),
        "Gemini defaults loaded"
    );

    let db_path = config.database.path.clone();
    ensure_parent_dir(&db_path);
    info!(path = %db_path, "opening SQLite database");
    db::init_db(&db::open(&db_path)?)?;
    info!("database migrations complete");

    // each repository gets its own connection
    let api_keys = ApiKeyRepo::new(db::open(&db_path)?);
    let personas = Arc::new(PersonaRepo::new(db::open(&db_path)?));
    let chatrooms = ChatroomRepo::new(db::open(&db_path)?);
    let messages = MessageRepo::new(db::open(&db_path)?);

    let provider: Arc<dyn GenerativeProvider> =
        Arc::new(GeminiProvider::from_config(&config.gemini));
    info!(provider = provider.name(), base_url = %config.gemini.base_url, "LLM provider ready");

    let chat = ChatPipeline::new(
        PersonaResolver::new(personas.clone()),
        SessionFactory::new(provider.clone(), settings),
        StreamRelay::from_config(&config.gemini),
    );

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState {
        chat,
        provider,
        api_keys,
        personas,
        chatrooms,
        messages,
        ws_clients: DashMap::new(),
    });
    let router = app::build_router(state.clone());

    info!("gemchat gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    Ok(())
}

/// Resolve on Ctrl-C, closing every open WS connection first.
async fn shutdown_signal(state: Arc<app::AppState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!(ws_clients = state.ws_clients.len(), "shutting down");
    for entry in state.ws_clients.iter() {
        entry.value().cancel();
    }
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
