//! Sequential evaluation crew: an ordered chain of specialist stages feeding
//! one synthesizer that emits the structured verdict.
//!
//! Flow per job: specialist 1 → … → specialist N (each sees all prior team
//! notes) → synthesizer (strict JSON verdict). A synthesizer parse failure is
//! soft — the job gets a zero-score sentinel and the batch keeps moving.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, warn};

use crate::errors::AppError;
use crate::llm_client::gate::CallGate;
use crate::llm_client::prompts::clip;
use crate::llm_client::sanitize::extract_json;
use crate::llm_client::{GenerateRequest, LlmError, REASONING_MODEL};
use crate::logbox::{LogKind, LogSink};
use crate::models::agent::AgentProfile;
use crate::models::job::{Job, VisaRisk};

/// Sentinel reasoning recorded when the synthesizer's reply cannot be parsed.
pub const OUTPUT_ERROR_REASONING: &str = "AI Output Error";
/// Sentinel evaluator name for system-produced results.
pub const SYSTEM_EVALUATOR: &str = "System";

/// Structured evaluation result for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAnalysis {
    pub id: String,
    pub match_score: u8,
    pub visa_risk: VisaRisk,
    pub reasoning: String,
    pub evaluated_by: String,
}

fn default_reasoning() -> String {
    "Analysis failed.".to_string()
}

/// The synthesizer's wire shape. Missing fields degrade to conservative
/// defaults rather than failing the parse (visa risk in particular defaults
/// to MEDIUM — a silent posting never reads as safe).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthVerdict {
    #[serde(default)]
    match_score: u8,
    #[serde(default)]
    visa_risk: VisaRisk,
    #[serde(default = "default_reasoning")]
    reasoning: String,
}

/// An evaluation crew: ordered specialists plus the terminal synthesizer.
pub struct Crew {
    specialists: Vec<AgentProfile>,
    synthesizer: AgentProfile,
}

/// Builds a crew from agent configs. The last config is promoted to
/// synthesizer; at least one config is required.
pub fn build_crew(mut configs: Vec<AgentProfile>) -> Result<Crew, AppError> {
    let synthesizer = configs.pop().ok_or_else(|| {
        AppError::Validation("evaluation crew needs at least one agent".to_string())
    })?;
    Ok(Crew {
        specialists: configs,
        synthesizer,
    })
}

impl Crew {
    pub fn specialist_count(&self) -> usize {
        self.specialists.len()
    }

    pub fn synthesizer_name(&self) -> &str {
        &self.synthesizer.name
    }

    /// Runs the full chain for one job. Stage N+1 never starts before stage
    /// N completes — each stage consumes all prior stages' text.
    pub async fn kickoff(
        &self,
        gate: &CallGate,
        job: &Job,
        resume_text: &str,
        log: &LogSink<'_>,
    ) -> Result<JobAnalysis, LlmError> {
        let mut notes: Vec<String> = Vec::new();

        for agent in &self.specialists {
            log(
                LogKind::Agent,
                &format!("Evaluating {}...", agent.focus),
                Some(&agent.name),
            );
            let prompt = super::prompts::agent_task_prompt(resume_text, job, agent, &notes);
            let mut request = GenerateRequest::text(prompt)
                .with_system(super::prompts::AGENT_SYSTEM_INSTRUCTION)
                .with_temperature(0.2);

            // Research-flavored specialists get search grounding.
            let focus = agent.focus.to_lowercase();
            if focus.contains("culture") || focus.contains("research") {
                request = request.with_tools(json!([{ "googleSearch": {} }]));
            }

            let reply = gate.submit(REASONING_MODEL, &request).await?;
            notes.push(reply.text_or(&format!("{}: No analysis provided.", agent.name)));
        }

        log(
            LogKind::Agent,
            "Synthesizing final score...",
            Some(&self.synthesizer.name),
        );
        self.synthesize(gate, job, resume_text, &notes).await
    }

    async fn synthesize(
        &self,
        gate: &CallGate,
        job: &Job,
        resume_text: &str,
        notes: &[String],
    ) -> Result<JobAnalysis, LlmError> {
        let prompt =
            super::prompts::agent_task_prompt(resume_text, job, &self.synthesizer, notes);
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "matchScore": { "type": "INTEGER", "description": "Score from 0-100 based on rubric" },
                "visaRisk": { "type": "STRING", "enum": ["LOW", "MEDIUM", "HIGH"] },
                "reasoning": { "type": "STRING", "description": "Concise reasoning summary (max 20 words)" }
            },
            "required": ["matchScore", "visaRisk", "reasoning"]
        });
        let request = GenerateRequest::text(prompt)
            .with_system(super::prompts::final_agent_system())
            .with_temperature(0.1)
            .with_schema(schema);

        let reply = gate.submit(REASONING_MODEL, &request).await?;
        let text = reply.text_or("{}");

        match serde_json::from_str::<SynthVerdict>(extract_json(&text)) {
            Ok(verdict) => Ok(JobAnalysis {
                id: job.id.clone(),
                match_score: verdict.match_score.min(100),
                visa_risk: verdict.visa_risk,
                reasoning: verdict.reasoning,
                evaluated_by: self.synthesizer.name.clone(),
            }),
            Err(err) => {
                error!("failed to parse synthesizer reply for job {}: {err}", job.id);
                Ok(JobAnalysis {
                    id: job.id.clone(),
                    match_score: 0,
                    visa_risk: VisaRisk::Medium,
                    reasoning: OUTPUT_ERROR_REASONING.to_string(),
                    evaluated_by: SYSTEM_EVALUATOR.to_string(),
                })
            }
        }
    }
}

/// What a sequential batch run produced.
pub struct SequentialOutcome {
    pub results: Vec<JobAnalysis>,
    /// Set when the run stopped because no credential was available; jobs
    /// without results were skipped, not failed.
    pub skipped_for_missing_key: bool,
}

/// Runs the crew over a batch of jobs, one at a time in input order.
///
/// Partial-failure semantics: an error on job K is logged and the loop moves
/// to job K+1. A missing credential short-circuits the whole run instead —
/// every remaining job would fail the same way.
pub async fn run_sequential(
    crew: &Crew,
    gate: &CallGate,
    jobs: &[Job],
    resume_text: &str,
    log: &LogSink<'_>,
) -> SequentialOutcome {
    let mut results = Vec::with_capacity(jobs.len());

    for (idx, job) in jobs.iter().enumerate() {
        log(
            LogKind::Info,
            &format!("Analyzing job {}/{}: {}", idx + 1, jobs.len(), job.company),
            None,
        );
        match crew.kickoff(gate, job, resume_text, log).await {
            Ok(analysis) => results.push(analysis),
            Err(LlmError::MissingKey) => {
                warn!("missing API key — evaluation skipped");
                log(LogKind::Warning, "Missing API key. Analysis skipped.", None);
                return SequentialOutcome {
                    results,
                    skipped_for_missing_key: true,
                };
            }
            Err(err) => {
                error!("crew failed for job {}: {err}", job.id);
                log(
                    LogKind::Warning,
                    &format!("Analysis failed for {}. Check logs.", job.company),
                    None,
                );
            }
        }
    }

    SequentialOutcome {
        results,
        skipped_for_missing_key: false,
    }
}

/// Short display form of a job id for log lines.
pub fn short_id(id: &str) -> &str {
    clip(id, 4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::gate::{CallGate, GateConfig};
    use crate::llm_client::testing::ScriptedBackend;
    use crate::models::agent::CrewKind;
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

    fn agent(name: &str, focus: &str) -> AgentProfile {
        AgentProfile::new(name, "Evaluator", focus, "🤖", CrewKind::Evaluation)
    }

    fn job(id: &str, description: &str) -> Job {
        let mut job: Job = serde_json::from_str(&format!(
            r#"{{"id":"{id}","title":"Python Backend","company":"Acme"}}"#
        ))
        .unwrap();
        job.description = description.to_string();
        job
    }

    #[test]
    fn test_build_crew_rejects_empty_config() {
        assert!(build_crew(vec![]).is_err());
    }

    #[test]
    fn test_build_crew_promotes_last_agent_to_synthesizer() {
        let crew = build_crew(vec![
            agent("A", "Skills"),
            agent("B", "Visa"),
            agent("Omega", "Verdict"),
        ])
        .unwrap();
        assert_eq!(crew.specialist_count(), 2);
        assert_eq!(crew.synthesizer_name(), "Omega");
    }

    #[tokio::test]
    async fn test_kickoff_chains_prior_notes_through_stages() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("Alpha note: skills look solid.");
        backend.push_text("Beta note: visa silent.");
        backend.push_text(r#"{"matchScore": 88, "visaRisk": "LOW", "reasoning": "Great"}"#);
        let gate = instant_gate(backend.clone());

        let crew = build_crew(vec![
            agent("Alpha", "Hard Skills"),
            agent("Beta", "Visa Safety"),
            agent("Omega", "Final Verdict"),
        ])
        .unwrap();

        let log = |_: LogKind, _: &str, _: Option<&str>| {};
        let analysis = crew
            .kickoff(&gate, &job("j1", "Build APIs"), "resume", &log)
            .await
            .unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        // Stage 2 sees stage 1's note; the synthesizer sees both.
        assert!(calls[1].contents.contains("Alpha note"));
        assert!(calls[2].contents.contains("Alpha note"));
        assert!(calls[2].contents.contains("Beta note"));

        assert_eq!(analysis.match_score, 88);
        assert_eq!(analysis.visa_risk, VisaRisk::Low);
        assert_eq!(analysis.evaluated_by, "Omega");
    }

    #[tokio::test]
    async fn test_silent_posting_defaults_visa_risk_to_medium() {
        // Happy path: the posting never mentions visas and the synthesizer
        // omits the field — the verdict must still come back MEDIUM.
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(r#"{"matchScore": 72, "reasoning": "Good baseline"}"#);
        let gate = instant_gate(backend);

        let crew = build_crew(vec![agent("Omega", "Final Verdict")]).unwrap();
        let log = |_: LogKind, _: &str, _: Option<&str>| {};
        let analysis = crew
            .kickoff(
                &gate,
                &job("j1", "Python Backend role, no visa mention"),
                "Senior Engineer, 5 yrs Python",
                &log,
            )
            .await
            .unwrap();

        assert_eq!(analysis.visa_risk, VisaRisk::Medium);
        assert!(analysis.match_score <= 100);
        assert_eq!(analysis.evaluated_by, "Omega");
    }

    #[tokio::test]
    async fn test_malformed_synthesizer_reply_yields_sentinel() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("not json");
        let gate = instant_gate(backend);

        let crew = build_crew(vec![agent("Omega", "Final Verdict")]).unwrap();
        let log = |_: LogKind, _: &str, _: Option<&str>| {};
        let analysis = crew
            .kickoff(&gate, &job("j1", "desc"), "resume", &log)
            .await
            .unwrap();

        assert_eq!(analysis.match_score, 0);
        assert_eq!(analysis.visa_risk, VisaRisk::Medium);
        assert_eq!(analysis.reasoning, OUTPUT_ERROR_REASONING);
        assert_eq!(analysis.evaluated_by, SYSTEM_EVALUATOR);
    }

    #[tokio::test]
    async fn test_fenced_synthesizer_reply_still_parses() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(
            "```json\n{\"matchScore\": 91, \"visaRisk\": \"HIGH\", \"reasoning\": \"Clearance\"}\n```",
        );
        let gate = instant_gate(backend);

        let crew = build_crew(vec![agent("Omega", "Final Verdict")]).unwrap();
        let log = |_: LogKind, _: &str, _: Option<&str>| {};
        let analysis = crew
            .kickoff(&gate, &job("j1", "desc"), "resume", &log)
            .await
            .unwrap();

        assert_eq!(analysis.match_score, 91);
        assert_eq!(analysis.visa_risk, VisaRisk::High);
    }

    #[tokio::test]
    async fn test_sequential_run_continues_past_failing_job() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_err(LlmError::Api {
            status: 500,
            message: "internal".to_string(),
        });
        backend.push_text(r#"{"matchScore": 60, "visaRisk": "MEDIUM", "reasoning": "ok"}"#);
        backend.push_text(r#"{"matchScore": 70, "visaRisk": "LOW", "reasoning": "fine"}"#);
        let gate = instant_gate(backend);

        let crew = build_crew(vec![agent("Omega", "Final Verdict")]).unwrap();
        let jobs = vec![job("j1", "a"), job("j2", "b"), job("j3", "c")];
        let log = |_: LogKind, _: &str, _: Option<&str>| {};

        let outcome = run_sequential(&crew, &gate, &jobs, "resume", &log).await;

        let ids: Vec<&str> = outcome.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["j2", "j3"]);
        assert!(!outcome.skipped_for_missing_key);
    }

    #[tokio::test]
    async fn test_missing_key_short_circuits_the_run() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_err(LlmError::MissingKey);
        let gate = instant_gate(backend.clone());

        let crew = build_crew(vec![agent("Omega", "Final Verdict")]).unwrap();
        let jobs = vec![job("j1", "a"), job("j2", "b"), job("j3", "c")];
        let log = |_: LogKind, _: &str, _: Option<&str>| {};

        let outcome = run_sequential(&crew, &gate, &jobs, "resume", &log).await;

        assert!(outcome.results.is_empty());
        assert!(outcome.skipped_for_missing_key);
        // One probe call, not one per job.
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_research_specialist_gets_search_tool() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("culture note");
        backend.push_text(r#"{"matchScore": 50, "visaRisk": "MEDIUM", "reasoning": "x"}"#);
        let gate = instant_gate(backend.clone());

        let crew = build_crew(vec![
            agent("Culture_Scout", "Culture & Research"),
            agent("Omega", "Final Verdict"),
        ])
        .unwrap();
        let log = |_: LogKind, _: &str, _: Option<&str>| {};
        crew.kickoff(&gate, &job("j1", "desc"), "resume", &log)
            .await
            .unwrap();

        let calls = backend.calls();
        assert!(calls[0].has_tools);
        assert!(!calls[1].has_tools);
    }
}
