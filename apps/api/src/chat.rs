//! Career-coach chat grounded in the user's own job table.
//!
//! Retrieval goes through the `JobSearcher` seam (semantic search when an
//! embedding backend is wired in, score-ranked fallback otherwise); the
//! retrieved subset plus a candidate backstory become the system prompt.

use serde_json::json;

use crate::llm_client::gate::CallGate;
use crate::llm_client::prompts::clip;
use crate::llm_client::{GenerateRequest, LlmError, PROSE_MODEL};
use crate::models::chat::{ChatMessage, ChatRole};
use crate::models::job::Job;
use crate::search::JobSearcher;

const CONTEXT_JOBS: usize = 10;

fn chat_system(context_data: &str, candidate_profile: &str) -> String {
    format!(
        r#"SYSTEM ROLE: You are a Strategic Career Coach.
TASK: Advise the candidate on their best opportunities.

CANDIDATE BACKSTORY:
{candidate_profile}

TOP JOBS CONTEXT:
{context_data}

GUIDELINES:
- Be realistic. If a job is a "Reach" (High score but missing 1 key skill), say so.
- Highlight "Hidden Gems" (Low applicants, high match).
- If asked "Am I a good fit?", explain WHY using the rubric (Skills + Impact)."#
    )
}

/// Answers one chat turn using retrieved job context.
pub async fn chat_with_jobs(
    gate: &CallGate,
    searcher: &dyn JobSearcher,
    history: &[ChatMessage],
    new_message: &str,
    jobs: &[Job],
    resume_text: &str,
    user_intent: &str,
) -> Result<String, LlmError> {
    let relevant = searcher.search(new_message, jobs, CONTEXT_JOBS).await;
    if relevant.is_empty() {
        return Ok(
            "I don't have enough data about the jobs to answer that yet. Try importing more jobs!"
                .to_string(),
        );
    }

    let context_data = serde_json::to_string(
        &relevant
            .iter()
            .map(|job| {
                json!({
                    "company": job.company,
                    "title": job.title,
                    "score": job.match_score,
                    "visa": job.visa_risk,
                    "salary": job.salary,
                    "details": clip(&job.description, 200),
                })
            })
            .collect::<Vec<_>>(),
    )?;

    let candidate_profile = format!(
        "USER INTENT: \"{user_intent}\"\nRESUME SNIPPET:\n\"{}...\"",
        clip(resume_text, 2000)
    );

    let transcript = history
        .iter()
        .map(|message| {
            let speaker = match message.role {
                ChatRole::User => "user",
                ChatRole::Model => "model",
            };
            format!("{speaker}: {}", message.text)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!("HISTORY:\n{transcript}\n\nUSER: {new_message}\n\nMODEL:");

    let reply = gate
        .submit(
            PROSE_MODEL,
            &GenerateRequest::text(prompt)
                .with_system(chat_system(&context_data, &candidate_profile)),
        )
        .await?;

    Ok(reply.text_or("I couldn't process that request."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::gate::{CallGate, GateConfig};
    use crate::llm_client::testing::ScriptedBackend;
    use crate::search::ScoreRankSearcher;
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

    fn job(id: &str, score: u8) -> Job {
        let mut job: Job = serde_json::from_str(&format!(
            r#"{{"id":"{id}","title":"Engineer","company":"Acme"}}"#
        ))
        .unwrap();
        job.match_score = Some(score);
        job
    }

    #[tokio::test]
    async fn test_empty_corpus_answers_without_a_call() {
        let backend = Arc::new(ScriptedBackend::new());
        let gate = instant_gate(backend.clone());

        let reply = chat_with_jobs(
            &gate,
            &ScoreRankSearcher,
            &[],
            "which jobs fit me?",
            &[],
            "resume",
            "backend roles",
        )
        .await
        .unwrap();

        assert!(reply.contains("importing more jobs"));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_system_prompt_carries_retrieved_jobs_and_intent() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("You should apply to Acme.");
        let gate = instant_gate(backend.clone());

        let jobs = vec![job("a", 90), job("b", 20)];
        let reply = chat_with_jobs(
            &gate,
            &ScoreRankSearcher,
            &[],
            "best options?",
            &jobs,
            "Senior Engineer resume",
            "platform roles",
        )
        .await
        .unwrap();

        assert_eq!(reply, "You should apply to Acme.");
        let call = &backend.calls()[0];
        let system = call.system.as_deref().unwrap();
        assert!(system.contains("platform roles"));
        assert!(system.contains("Acme"));
        assert!(call.contents.contains("USER: best options?"));
    }

    #[tokio::test]
    async fn test_history_rides_in_the_prompt() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("Noted.");
        let gate = instant_gate(backend.clone());

        let history = vec![ChatMessage {
            role: ChatRole::User,
            text: "earlier question".to_string(),
            timestamp: 0,
        }];
        chat_with_jobs(
            &gate,
            &ScoreRankSearcher,
            &history,
            "follow-up",
            &[job("a", 50)],
            "resume",
            "intent",
        )
        .await
        .unwrap();

        assert!(backend.calls()[0].contents.contains("user: earlier question"));
    }
}
