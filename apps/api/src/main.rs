mod artifacts;
mod chat;
mod config;
mod errors;
mod evaluation;
mod generation;
mod llm_client;
mod logbox;
mod models;
mod routes;
mod search;
mod session;
mod state;
mod stores;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::gate::{CallGate, GateConfig};
use crate::llm_client::{GeminiClient, PROSE_MODEL, REASONING_MODEL};
use crate::routes::build_router;
use crate::search::{JobSearcher, ScoreRankSearcher};
use crate::session::SessionService;
use crate::state::AppState;
use crate::stores::{KvStore, MemoryStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting SafeSubmit API v{}", env!("CARGO_PKG_VERSION"));

    // Session store: Redis when configured, in-process memory otherwise
    let store: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.clone())?;
            info!("Redis session store initialized");
            Arc::new(RedisStore::new(client))
        }
        None => {
            info!("No REDIS_URL set — sessions held in process memory");
            Arc::new(MemoryStore::new())
        }
    };

    // Model backend + the single serialized call lane
    let backend = Arc::new(GeminiClient::new(config.gemini_api_key.clone(), store.clone()));
    let gate = Arc::new(CallGate::new(backend, GateConfig::default()));
    info!("Call gate initialized (models: {REASONING_MODEL} / {PROSE_MODEL})");

    if config.gemini_api_key.is_none() {
        info!("No environment API key — model calls need a user-supplied key");
    }

    // Semantic search seam: score-ranked fallback until an embedding
    // backend is wired in
    let searcher: Arc<dyn JobSearcher> = Arc::new(ScoreRankSearcher);

    let session = Arc::new(SessionService::new(store.clone(), gate, searcher));
    session.restore().await?;

    let state = AppState {
        session,
        store,
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
