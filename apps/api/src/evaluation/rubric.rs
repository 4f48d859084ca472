//! Evaluation rubric — the derived instruction blob built once per
//! (résumé, intent) pair and passed verbatim into every evaluation call for
//! that pair. Jobs analyzed under different intents are not comparable, so
//! the session re-derives this whenever the intent changes.

use crate::llm_client::prompts::clip;

/// Composes the candidate-profile instructions for batch evaluation.
pub fn compose_instructions(resume_text: &str, intent: &str) -> String {
    format!(
        r#"CANDIDATE PROFILE:
TARGET INTENT: "{intent}"
RESUME:
"{resume}..."

YOUR GOAL:
Compare the jobs below against this candidate profile.
Follow the SCORING RUBRIC and VISA GUIDE strictly."#,
        intent = intent,
        resume = clip(resume_text, 3000),
    )
}
