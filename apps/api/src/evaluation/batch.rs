//! Whole-batch evaluation: one call covering every queued job.
//!
//! Trades per-job isolation for throughput — a single malformed reply fails
//! the entire batch (the caller may re-invoke, possibly with fewer jobs).

use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::llm_client::gate::CallGate;
use crate::llm_client::prompts::clip;
use crate::llm_client::sanitize::extract_json;
use crate::llm_client::{GenerateRequest, LlmError, REASONING_MODEL};
use crate::logbox::{LogKind, LogSink};
use crate::models::job::{Job, VisaRisk};

use super::crew::{short_id, JobAnalysis};

fn default_reasoning() -> String {
    "Analysis failed.".to_string()
}

fn default_evaluated_by() -> String {
    "AI_Evaluator".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchVerdict {
    id: String,
    #[serde(default)]
    match_score: u8,
    #[serde(default)]
    visa_risk: VisaRisk,
    #[serde(default = "default_reasoning")]
    reasoning: String,
    #[serde(default = "default_evaluated_by")]
    evaluated_by: String,
}

/// Evaluates all `jobs` in one structured call against the rubric.
///
/// Results are distributed back by the id the model echoes; a result whose
/// id matches no submitted job is dropped with a warning. A reply that does
/// not parse as the expected array fails the whole batch.
pub async fn analyze_jobs_in_batch(
    gate: &CallGate,
    instructions: &str,
    jobs: &[Job],
    log: &LogSink<'_>,
) -> Result<Vec<JobAnalysis>, LlmError> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let job_list = jobs
        .iter()
        .enumerate()
        .map(|(idx, job)| {
            format!(
                "--- JOB #{n} ---\nID: {id}\nTITLE: {title}\nCOMPANY: {company}\nDESCRIPTION: {description}",
                n = idx + 1,
                id = job.id,
                title = job.title,
                company = job.company,
                description = clip(&job.description, 1000),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let prompt = format!("{instructions}\n\nBATCH OF JOBS TO ANALYZE:\n{job_list}");

    let schema = json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "id": { "type": "STRING" },
                "matchScore": { "type": "INTEGER" },
                "visaRisk": { "type": "STRING", "enum": ["LOW", "MEDIUM", "HIGH"] },
                "reasoning": { "type": "STRING" },
                "evaluatedBy": { "type": "STRING" }
            },
            "required": ["id", "matchScore", "visaRisk", "reasoning", "evaluatedBy"]
        }
    });

    log(
        LogKind::Info,
        &format!("Submitting batch of {} jobs for evaluation...", jobs.len()),
        None,
    );

    let request = GenerateRequest::text(prompt)
        .with_system(super::prompts::batch_evaluation_system())
        .with_temperature(0.1)
        .with_schema(schema);

    let reply = gate.submit(REASONING_MODEL, &request).await?;
    let text = reply.text_or("[]");
    let verdicts: Vec<BatchVerdict> = serde_json::from_str(extract_json(&text))?;

    let mut results = Vec::with_capacity(verdicts.len());
    for verdict in verdicts {
        if !jobs.iter().any(|job| job.id == verdict.id) {
            warn!("batch reply referenced unknown job id {}", verdict.id);
            continue;
        }
        log(
            LogKind::Success,
            &format!(
                "Analyzed {}... Score: {}",
                short_id(&verdict.id),
                verdict.match_score
            ),
            None,
        );
        results.push(JobAnalysis {
            id: verdict.id,
            match_score: verdict.match_score.min(100),
            visa_risk: verdict.visa_risk,
            reasoning: verdict.reasoning,
            evaluated_by: verdict.evaluated_by,
        });
    }

    Ok(results)
}
