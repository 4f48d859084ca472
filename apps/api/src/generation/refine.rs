//! Refine-loop primitives: the critic verdict parser and the best-draft
//! accumulator.
//!
//! The "keep best, not last" rule lives in `maybe_update_best` as a pure
//! function so it stays testable independent of loop control flow — a final
//! revision that regresses quality must never ship.

use serde::Deserialize;
use tracing::warn;

use crate::llm_client::sanitize::extract_json;

/// Upper bound on critic/reviser iterations per generation.
pub const MAX_REFINE_ITERATIONS: u32 = 3;
/// Critic score at which the loop stops revising.
pub const SCORE_THRESHOLD: u8 = 85;

/// The critic's structured reply. A reply that fails to parse degrades to
/// the default (score 0), which forces another revision rather than
/// aborting the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticVerdict {
    #[serde(default)]
    pub score: u8,
    #[serde(default)]
    pub critique: String,
    #[serde(default)]
    pub revision_instructions: String,
}

pub fn parse_critic_verdict(text: &str) -> CriticVerdict {
    match serde_json::from_str::<CriticVerdict>(extract_json(text)) {
        Ok(mut verdict) => {
            verdict.score = verdict.score.min(100);
            verdict
        }
        Err(err) => {
            warn!("critic reply did not parse, treating as score 0: {err}");
            CriticVerdict::default()
        }
    }
}

/// The best-scoring draft seen so far across the refine loop.
#[derive(Debug, Clone, Default)]
pub struct BestDraft {
    pub score: u8,
    pub draft: String,
}

impl BestDraft {
    /// Seeds the accumulator with the pre-loop draft at score 0 so a run of
    /// all-zero critic scores still carries a usable document forward.
    pub fn seeded(draft: &str) -> Self {
        Self {
            score: 0,
            draft: draft.to_string(),
        }
    }
}

/// Returns the accumulator updated with a candidate. Strict improvement
/// wins; on a tie the earlier draft is kept.
pub fn maybe_update_best(best: BestDraft, candidate_score: u8, candidate_draft: &str) -> BestDraft {
    if candidate_score > best.score {
        BestDraft {
            score: candidate_score,
            draft: candidate_draft.to_string(),
        }
    } else {
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maybe_update_best_takes_strict_improvement() {
        let best = maybe_update_best(BestDraft::seeded("v0"), 40, "v1");
        assert_eq!(best.score, 40);
        assert_eq!(best.draft, "v1");
    }

    #[test]
    fn test_maybe_update_best_keeps_earlier_draft_on_tie() {
        let best = BestDraft {
            score: 40,
            draft: "first".to_string(),
        };
        let best = maybe_update_best(best, 40, "second");
        assert_eq!(best.draft, "first");
    }

    #[test]
    fn test_maybe_update_best_ignores_regression() {
        let best = BestDraft {
            score: 70,
            draft: "good".to_string(),
        };
        let best = maybe_update_best(best, 30, "worse");
        assert_eq!(best.score, 70);
        assert_eq!(best.draft, "good");
    }

    #[test]
    fn test_best_score_dominates_every_seen_score() {
        let scores = [40u8, 35, 30];
        let mut best = BestDraft::seeded("d0");
        for (i, score) in scores.iter().enumerate() {
            best = maybe_update_best(best, *score, &format!("d{i}"));
        }
        assert!(scores.iter().all(|s| best.score >= *s));
        assert_eq!(best.draft, "d0");
    }

    #[test]
    fn test_parse_critic_verdict_happy_path() {
        let verdict = parse_critic_verdict(
            r#"{"score": 78, "critique": "Too generic", "revisionInstructions": "Add metrics"}"#,
        );
        assert_eq!(verdict.score, 78);
        assert_eq!(verdict.critique, "Too generic");
        assert_eq!(verdict.revision_instructions, "Add metrics");
    }

    #[test]
    fn test_parse_critic_verdict_handles_fences() {
        let verdict = parse_critic_verdict("```json\n{\"score\": 90}\n```");
        assert_eq!(verdict.score, 90);
    }

    #[test]
    fn test_parse_critic_verdict_degrades_to_zero_on_garbage() {
        let verdict = parse_critic_verdict("the draft is decent, maybe a 7/10?");
        assert_eq!(verdict.score, 0);
        assert!(verdict.critique.is_empty());
    }

    #[test]
    fn test_parse_critic_verdict_clamps_score_to_100() {
        let verdict = parse_critic_verdict(r#"{"score": 150}"#);
        assert_eq!(verdict.score, 100);
    }
}
