pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::session::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Session
        .route("/api/v1/session/start", post(handlers::handle_start_session))
        .route("/api/v1/session/intent", post(handlers::handle_set_intent))
        .route("/api/v1/session/reset", post(handlers::handle_reset))
        .route("/api/v1/session/key/clear", post(handlers::handle_clear_key))
        // Resume
        .route("/api/v1/resume", post(handlers::handle_upload_resume))
        // Agents
        .route("/api/v1/agents/recruit", post(handlers::handle_recruit_agents))
        // Jobs
        .route("/api/v1/jobs", get(handlers::handle_list_jobs))
        .route("/api/v1/jobs/import", post(handlers::handle_import_jobs))
        .route("/api/v1/jobs/analyze", post(handlers::handle_analyze_jobs))
        .route(
            "/api/v1/jobs/:id/generate",
            post(handlers::handle_generate_resume),
        )
        .route("/api/v1/jobs/:id/retry", post(handlers::handle_retry_job))
        .route("/api/v1/jobs/:id/audio", post(handlers::handle_audio_summary))
        // Chat & activity log
        .route("/api/v1/chat", post(handlers::handle_chat))
        .route("/api/v1/logs", get(handlers::handle_logs))
        .with_state(state)
}
