use axum::extract::{Multipart, Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::evaluation::crew::JobAnalysis;
use crate::llm_client::{keys, validate_key};
use crate::logbox::LogEntry;
use crate::models::agent::AgentProfile;
use crate::models::chat::ChatMessage;
use crate::models::job::Job;
use crate::session::{AnalysisMode, ImportSummary};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub valid: bool,
}

/// POST /api/v1/session/start
/// Validates a user-supplied API key and stores it (obfuscated) on success.
pub async fn handle_start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<Json<StartSessionResponse>, AppError> {
    if request.api_key.trim().is_empty() {
        return Err(AppError::Validation("Please provide an API key".to_string()));
    }
    let valid = validate_key(&request.api_key).await;
    if valid {
        keys::save_user_key(state.store.as_ref(), &request.api_key)
            .await
            .map_err(AppError::Internal)?;
    }
    Ok(Json(StartSessionResponse { valid }))
}

/// POST /api/v1/session/key/clear
/// Removes the stored user API key; the environment key (if any) remains.
pub async fn handle_clear_key(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    keys::clear_user_key(state.store.as_ref())
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "status": "ok" })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_name: String,
    pub fingerprint: String,
    pub uploaded_at: DateTime<Utc>,
}

/// POST /api/v1/resume (multipart)
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Validation(format!("Invalid multipart upload: {err}")))?
    {
        let file_name = field.file_name().unwrap_or("resume.txt").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::Validation(format!("Could not read upload: {err}")))?;
        let profile = state.session.upload_resume(&file_name, &bytes).await?;
        return Ok(Json(UploadResponse {
            file_name: profile.file_name,
            fingerprint: profile.fingerprint,
            uploaded_at: profile.uploaded_at,
        }));
    }
    Err(AppError::Validation("No file found in upload".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub intent: String,
}

/// POST /api/v1/session/intent
pub async fn handle_set_intent(
    State(state): State<AppState>,
    Json(request): Json<IntentRequest>,
) -> Result<Json<Value>, AppError> {
    state.session.set_intent(&request.intent).await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// POST /api/v1/agents/recruit
pub async fn handle_recruit_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentProfile>>, AppError> {
    Ok(Json(state.session.recruit_agents().await?))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.session.jobs())
}

/// POST /api/v1/jobs/import
pub async fn handle_import_jobs(
    State(state): State<AppState>,
    Json(jobs): Json<Vec<Job>>,
) -> Result<Json<ImportSummary>, AppError> {
    Ok(Json(state.session.import_jobs(jobs).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub mode: AnalysisMode,
}

/// POST /api/v1/jobs/analyze
pub async fn handle_analyze_jobs(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Vec<JobAnalysis>>, AppError> {
    let results = state
        .session
        .analyze_next_batch(request.batch_size, request.mode)
        .await?;
    Ok(Json(results))
}

/// POST /api/v1/jobs/:id/generate
pub async fn handle_generate_resume(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.session.generate_for_job(&job_id).await?))
}

/// POST /api/v1/jobs/:id/retry
pub async fn handle_retry_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, AppError> {
    Ok(Json(state.session.retry_job(&job_id).await?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioResponse {
    pub audio_summary: Option<String>,
}

/// POST /api/v1/jobs/:id/audio
pub async fn handle_audio_summary(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<AudioResponse>, AppError> {
    let audio_summary = state.session.audio_for_job(&job_id).await?;
    Ok(Json(AudioResponse { audio_summary }))
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let reply = state
        .session
        .chat(&request.history, &request.message)
        .await?;
    Ok(Json(ChatResponse { reply }))
}

/// GET /api/v1/logs
pub async fn handle_logs(State(state): State<AppState>) -> Json<Vec<LogEntry>> {
    Json(state.session.log_entries())
}

/// POST /api/v1/session/reset
pub async fn handle_reset(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    state.session.reset().await?;
    Ok(Json(json!({ "status": "reset" })))
}
