/// LLM Client — the single point of entry for all Gemini API calls in SafeSubmit.
///
/// ARCHITECTURAL RULE: No other module may call the Gemini API directly.
/// All model interactions MUST go through this module, and every generation
/// call additionally goes through the `CallGate` so the shared quota is
/// never hit concurrently.
///
/// Models are hardcoded — do not make configurable to prevent drift.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::stores::KvStore;

pub mod gate;
pub mod keys;
pub mod prompts;
pub mod sanitize;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Complex structured reasoning: evaluation synthesis, critique, panel builds.
pub const REASONING_MODEL: &str = "gemini-3-pro-preview";
/// Fast prose generation: drafting, revision, editing, chat.
pub const PROSE_MODEL: &str = "gemini-2.5-flash";
/// Text-to-speech for the audio summary feature.
pub const AUDIO_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Transport-level timeout. Generation calls can legitimately run long;
/// there is no application-level timeout on top of this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("missing API key")]
    MissingKey,

    #[error("model returned no candidates")]
    EmptyContent,
}

impl LlmError {
    /// Whether this error is in the retryable rate-limit class:
    /// HTTP 429 or a quota-exhaustion signal in the message body.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            LlmError::Api { status, message } => {
                if *status == 429 {
                    return true;
                }
                let lower = message.to_lowercase();
                lower.contains("quota") || lower.contains("resource_exhausted")
            }
            _ => false,
        }
    }
}

/// One outbound generation request, provider-agnostic.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub contents: String,
    pub system_instruction: Option<String>,
    pub temperature: Option<f32>,
    pub response_mime_type: Option<String>,
    pub response_schema: Option<Value>,
    pub tools: Option<Value>,
    pub response_modalities: Option<Vec<String>>,
}

impl GenerateRequest {
    pub fn text(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Request a JSON reply without a schema (the model is trusted to
    /// follow the prompt's output contract).
    pub fn expect_json(mut self) -> Self {
        self.response_mime_type = Some("application/json".to_string());
        self
    }

    /// Request a JSON reply constrained by an explicit response schema.
    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self.expect_json()
    }

    pub fn with_tools(mut self, tools: Value) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_modalities(mut self, modalities: &[&str]) -> Self {
        self.response_modalities = Some(modalities.iter().map(|m| m.to_string()).collect());
        self
    }
}

/// A normalized model reply. `text` carries prose/JSON output; `inline_data`
/// carries base64 payloads (audio).
#[derive(Debug, Clone, Default)]
pub struct GenerateReply {
    pub text: Option<String>,
    pub inline_data: Option<String>,
}

impl GenerateReply {
    /// The reply text, or `fallback` when the model returned nothing usable.
    pub fn text_or(&self, fallback: &str) -> String {
        match self.text.as_deref() {
            Some(text) if !text.trim().is_empty() => text.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// The model invocation boundary. Implemented by `GeminiClient` in
/// production and by a scripted backend in tests.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateReply, LlmError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Gemini wire format
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ApiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiContent<'a> {
    parts: Vec<ApiPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<&'a [String]>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    contents: Vec<ApiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<ApiGenerationConfig<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a Value>,
}

#[derive(Debug, Deserialize)]
struct ApiInlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    text: Option<String>,
    inline_data: Option<ApiInlineData>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Production client
// ────────────────────────────────────────────────────────────────────────────

/// The Gemini-backed `ModelBackend`.
///
/// Credential resolution happens per call, in order: user-supplied key from
/// the key/value store, then the environment key. Neither present means the
/// call fails with `MissingKey` and the caller skips the operation — nothing
/// is ever silently charged.
pub struct GeminiClient {
    http: Client,
    env_key: Option<String>,
    store: Arc<dyn KvStore>,
}

impl GeminiClient {
    pub fn new(env_key: Option<String>, store: Arc<dyn KvStore>) -> Self {
        Self {
            http: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            env_key,
            store,
        }
    }

    async fn resolve_key(&self) -> Option<String> {
        if let Some(key) = keys::load_user_key(self.store.as_ref()).await {
            return Some(key);
        }
        self.env_key.clone()
    }
}

#[async_trait]
impl ModelBackend for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateReply, LlmError> {
        let key = self.resolve_key().await.ok_or(LlmError::MissingKey)?;

        let generation_config = if request.temperature.is_some()
            || request.response_mime_type.is_some()
            || request.response_schema.is_some()
            || request.response_modalities.is_some()
        {
            Some(ApiGenerationConfig {
                temperature: request.temperature,
                response_mime_type: request.response_mime_type.as_deref(),
                response_schema: request.response_schema.as_ref(),
                response_modalities: request.response_modalities.as_deref(),
            })
        } else {
            None
        };

        let body = ApiRequest {
            contents: vec![ApiContent {
                parts: vec![ApiPart {
                    text: &request.contents,
                }],
            }],
            system_instruction: request.system_instruction.as_deref().map(|text| ApiContent {
                parts: vec![ApiPart { text }],
            }),
            generation_config,
            tools: request.tools.as_ref(),
        };

        let response = self
            .http
            .post(format!("{GEMINI_API_BASE}/models/{model}:generateContent"))
            .header("x-goog-api-key", &key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ApiResponse = response.json().await?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyContent)?;

        let mut reply = GenerateReply::default();
        for part in candidate.content.into_iter().flat_map(|c| c.parts) {
            if reply.text.is_none() {
                reply.text = part.text;
            }
            if reply.inline_data.is_none() {
                reply.inline_data = part.inline_data.map(|d| d.data);
            }
        }

        debug!(model, has_text = reply.text.is_some(), "model call succeeded");
        Ok(reply)
    }
}

/// Makes a minimal call to test a candidate API key before it is saved.
pub async fn validate_key(key: &str) -> bool {
    let client = match Client::builder().timeout(Duration::from_secs(30)).build() {
        Ok(client) => client,
        Err(_) => return false,
    };
    let body = serde_json::json!({ "contents": [{ "parts": [{ "text": "ping" }] }] });
    match client
        .post(format!(
            "{GEMINI_API_BASE}/models/{PROSE_MODEL}:generateContent"
        ))
        .header("x-goog-api-key", key)
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Test support
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::{GenerateReply, GenerateRequest, LlmError, ModelBackend};

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub model: String,
        pub contents: String,
        pub system: Option<String>,
        pub has_tools: bool,
        pub at: Instant,
    }

    /// Replays a scripted sequence of replies/errors and records every call.
    #[derive(Default)]
    pub struct ScriptedBackend {
        script: Mutex<VecDeque<Result<GenerateReply, LlmError>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_text(&self, text: &str) {
            self.script.lock().unwrap().push_back(Ok(GenerateReply {
                text: Some(text.to_string()),
                inline_data: None,
            }));
        }

        pub fn push_err(&self, err: LlmError) {
            self.script.lock().unwrap().push_back(Err(err));
        }

        pub fn rate_limit_err() -> LlmError {
            LlmError::Api {
                status: 429,
                message: "quota exceeded".to_string(),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn generate(
            &self,
            model: &str,
            request: &GenerateRequest,
        ) -> Result<GenerateReply, LlmError> {
            self.calls.lock().unwrap().push(RecordedCall {
                model: model.to_string(),
                contents: request.contents.clone(),
                system: request.system_instruction.clone(),
                has_tools: request.tools.is_some(),
                at: Instant::now(),
            });
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| {
                    Err(LlmError::Api {
                        status: 500,
                        message: "scripted backend exhausted".to_string(),
                    })
                })
        }
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(ScriptedBackend::rate_limit_err().is_rate_limit());
        assert!(LlmError::Api {
            status: 503,
            message: "RESOURCE_EXHAUSTED: quota".to_string()
        }
        .is_rate_limit());
        assert!(!LlmError::Api {
            status: 500,
            message: "internal".to_string()
        }
        .is_rate_limit());
        assert!(!LlmError::MissingKey.is_rate_limit());
    }
}
