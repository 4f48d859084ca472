//! The tailoring pipeline for one job.
//!
//! Flow: STRATEGY → DRAFT → [REFINE]* → FORMAT → VERIFY → DONE.
//! The refine loop is bounded by `MAX_REFINE_ITERATIONS` and gated on
//! `SCORE_THRESHOLD`; the best-scoring draft seen is what moves on when the
//! budget runs out. Any stage failure propagates uncaught — the caller marks
//! the job FAILED and caches nothing.

use crate::llm_client::gate::CallGate;
use crate::llm_client::sanitize::clean_markdown;
use crate::llm_client::{GenerateRequest, LlmError, PROSE_MODEL, REASONING_MODEL};
use crate::logbox::{LogKind, LogSink};
use crate::models::job::{GenerationPhase, Job};

use super::prompts;
use super::refine::{
    maybe_update_best, parse_critic_verdict, BestDraft, MAX_REFINE_ITERATIONS, SCORE_THRESHOLD,
};

/// Callbacks surfaced to the caller: phase transitions for progress display
/// and agent-attributed activity-log events.
pub struct GenerationHooks<'a> {
    pub on_phase: &'a (dyn Fn(GenerationPhase) + Send + Sync),
    pub log: &'a LogSink<'a>,
}

/// Runs the full pipeline and returns the sanitized final document.
pub async fn generate_tailored_resume(
    gate: &CallGate,
    job: &Job,
    resume_text: &str,
    hooks: &GenerationHooks<'_>,
) -> Result<String, LlmError> {
    // Iteration history is append-only and isolated per job; every critic
    // and reviser call sees the whole trail so feedback is never lost.
    let mut history: Vec<String> = Vec::new();

    // Phase 1: strategy
    (hooks.on_phase)(GenerationPhase::Strategy);
    (hooks.log)(
        LogKind::Agent,
        "Architecting tailoring strategy based on job gaps...",
        Some("Resume_Architect"),
    );
    let strategy_reply = gate
        .submit(
            PROSE_MODEL,
            &GenerateRequest::text(prompts::architect_prompt(resume_text, job))
                .with_temperature(0.3),
        )
        .await?;
    let strategy = strategy_reply.text_or("Focus on relevant skills.");
    (hooks.log)(
        LogKind::Success,
        "Strategy developed. Handing off to Writer.",
        Some("Resume_Architect"),
    );

    // Phase 2: initial draft
    (hooks.on_phase)(GenerationPhase::Draft);
    (hooks.log)(
        LogKind::Agent,
        "Drafting new experience bullets using active voice...",
        Some("Lead_Ghostwriter"),
    );
    let draft_reply = gate
        .submit(
            PROSE_MODEL,
            &GenerateRequest::text(prompts::writer_prompt(&strategy, resume_text))
                .with_temperature(0.5),
        )
        .await?;
    let mut current_draft = draft_reply.text_or("Resume draft.");
    (hooks.log)(
        LogKind::Success,
        "Initial draft complete. Beginning Iterative Review.",
        Some("Lead_Ghostwriter"),
    );

    // Phase 3: bounded critic ⇄ reviser loop
    (hooks.on_phase)(GenerationPhase::Refine);
    let mut best = BestDraft::seeded(&current_draft);

    for iteration in 1..=MAX_REFINE_ITERATIONS {
        (hooks.log)(
            LogKind::Agent,
            &format!("Iteration {iteration}/{MAX_REFINE_ITERATIONS}: Critic evaluating draft..."),
            Some("Lead_Critic"),
        );

        let history_text = history.join("\n\n");
        let critic_reply = gate
            .submit(
                REASONING_MODEL,
                &GenerateRequest::text(prompts::critic_prompt(
                    &current_draft,
                    &job.description,
                    &history_text,
                ))
                .expect_json(),
            )
            .await?;
        let verdict = parse_critic_verdict(&critic_reply.text_or("{}"));

        (hooks.log)(
            LogKind::Info,
            &format!("Score: {}. {}", verdict.score, verdict.critique),
            Some("Lead_Critic"),
        );
        history.push(format!(
            "Iteration {iteration} Critique: Score {}. {}",
            verdict.score, verdict.critique
        ));

        best = maybe_update_best(best, verdict.score, &current_draft);

        if verdict.score >= SCORE_THRESHOLD {
            (hooks.log)(
                LogKind::Success,
                "Threshold met! Proceeding to final polish.",
                Some("Lead_Critic"),
            );
            break;
        }

        if iteration < MAX_REFINE_ITERATIONS {
            (hooks.log)(
                LogKind::Agent,
                "Score below threshold. Instructing revision...",
                Some("Lead_Critic"),
            );
            let short_instruction = if verdict.revision_instructions.chars().count() > 60 {
                let head: String = verdict.revision_instructions.chars().take(60).collect();
                format!("{head}...")
            } else {
                verdict.revision_instructions.clone()
            };
            (hooks.log)(
                LogKind::Info,
                &format!("Feedback passed to Reviser: \"{short_instruction}\""),
                Some("System"),
            );

            let reviser_reply = gate
                .submit(
                    PROSE_MODEL,
                    &GenerateRequest::text(prompts::reviser_prompt(
                        &current_draft,
                        &verdict.revision_instructions,
                        &history_text,
                    ))
                    .with_temperature(0.3),
                )
                .await?;
            history.push(format!(
                "Iteration {iteration} Revision: Applied instructions -> {}",
                verdict.revision_instructions
            ));
            current_draft = reviser_reply.text_or(&current_draft);
            (hooks.log)(
                LogKind::Success,
                "Revision complete. Re-submitting to Critic.",
                Some("Expert_Reviser"),
            );
        } else {
            (hooks.log)(
                LogKind::Warning,
                "Max iterations reached. Selecting best available draft.",
                Some("Lead_Critic"),
            );
            current_draft = best.draft.clone();
        }
    }

    // Phase 4: format
    (hooks.on_phase)(GenerationPhase::Format);
    (hooks.log)(
        LogKind::Agent,
        "Formatting to Markdown and removing fluff...",
        Some("Chief_Editor"),
    );
    let editor_reply = gate
        .submit(
            PROSE_MODEL,
            &GenerateRequest::text(prompts::editor_prompt(&current_draft)).with_temperature(0.1),
        )
        .await?;
    let edited = editor_reply.text_or(&current_draft);
    (hooks.log)(
        LogKind::Success,
        "Editing complete. Requesting final QA.",
        Some("Chief_Editor"),
    );

    // Phase 5: verify
    (hooks.on_phase)(GenerationPhase::Verify);
    (hooks.log)(
        LogKind::Agent,
        "Verifying against Job Description constraints...",
        Some("QA_Specialist"),
    );
    let qa_reply = gate
        .submit(
            PROSE_MODEL,
            &GenerateRequest::text(prompts::qa_prompt(&edited, &job.description))
                .with_temperature(0.1),
        )
        .await?;
    let final_raw = qa_reply.text_or(&edited);

    // Local guardrail, no call: strip fences and conversational filler.
    let final_markdown = clean_markdown(&final_raw);

    (hooks.on_phase)(GenerationPhase::Done);
    (hooks.log)(
        LogKind::Success,
        "Quality check passed. Final resume ready.",
        Some("QA_Specialist"),
    );

    Ok(final_markdown)
}
