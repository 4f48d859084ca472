//! Spoken job-match summary — a single TTS call returning base64 audio.
//! Failures degrade to `None`; audio is a garnish, never a blocker.

use tracing::warn;

use crate::llm_client::gate::CallGate;
use crate::llm_client::{GenerateRequest, AUDIO_MODEL};
use crate::models::job::Job;

use super::prompts::audio_summary_prompt;

pub async fn generate_audio_summary(gate: &CallGate, job: &Job) -> Option<String> {
    let request =
        GenerateRequest::text(audio_summary_prompt(job)).with_modalities(&["AUDIO"]);

    match gate.submit(AUDIO_MODEL, &request).await {
        Ok(reply) => reply.inline_data,
        Err(err) => {
            warn!("audio summary failed for job {}: {err}", job.id);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::gate::{CallGate, GateConfig};
    use crate::llm_client::testing::ScriptedBackend;
    use crate::llm_client::LlmError;
    use std::sync::Arc;
    use tokio::time::Duration;

    fn instant_gate(backend: Arc<ScriptedBackend>) -> CallGate {
        CallGate::new(
            backend,
            GateConfig {
                min_interval: Duration::ZERO,
                max_retries: 3,
                backoff_base: Duration::ZERO,
            },
        )
    }

    fn job() -> Job {
        serde_json::from_str(r#"{"id":"j1","title":"SRE","company":"Acme"}"#).unwrap()
    }

    #[tokio::test]
    async fn test_failure_degrades_to_none() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_err(LlmError::MissingKey);
        let gate = instant_gate(backend);

        assert_eq!(generate_audio_summary(&gate, &job()).await, None);
    }

    #[tokio::test]
    async fn test_text_only_reply_yields_none() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("no audio here");
        let gate = instant_gate(backend);

        assert_eq!(generate_audio_summary(&gate, &job()).await, None);
    }
}
