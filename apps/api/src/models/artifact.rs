use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::job::VisaRisk;

/// A cached evaluation/generation result for one (résumé fingerprint, job id)
/// key. The artifact is the source of truth; job rows are a read-through view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visa_risk: Option<VisaRisk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_resume: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Artifact {
    fn default() -> Self {
        Self {
            match_score: None,
            visa_risk: None,
            reasoning: None,
            evaluated_by: None,
            generated_resume: None,
            updated_at: Utc::now(),
        }
    }
}

/// A partial write against an artifact. Only provided fields overwrite —
/// the evaluation writer and the generation writer each touch their own
/// fields, so neither can clobber the other's fresher result.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPatch {
    pub match_score: Option<u8>,
    pub visa_risk: Option<VisaRisk>,
    pub reasoning: Option<String>,
    pub evaluated_by: Option<String>,
    pub generated_resume: Option<String>,
}

impl ArtifactPatch {
    /// An evaluation-only patch.
    pub fn evaluation(
        match_score: u8,
        visa_risk: VisaRisk,
        reasoning: &str,
        evaluated_by: &str,
    ) -> Self {
        Self {
            match_score: Some(match_score),
            visa_risk: Some(visa_risk),
            reasoning: Some(reasoning.to_string()),
            evaluated_by: Some(evaluated_by.to_string()),
            generated_resume: None,
        }
    }

    /// A generation-only patch.
    pub fn generation(generated_resume: &str) -> Self {
        Self {
            generated_resume: Some(generated_resume.to_string()),
            ..Self::default()
        }
    }
}

impl Artifact {
    /// Merges a patch into this artifact and stamps `updated_at`.
    /// Absent patch fields retain their prior values.
    pub fn merge(&mut self, patch: ArtifactPatch, now: DateTime<Utc>) {
        if let Some(score) = patch.match_score {
            self.match_score = Some(score);
        }
        if let Some(risk) = patch.visa_risk {
            self.visa_risk = Some(risk);
        }
        if let Some(reasoning) = patch.reasoning {
            self.reasoning = Some(reasoning);
        }
        if let Some(evaluated_by) = patch.evaluated_by {
            self.evaluated_by = Some(evaluated_by);
        }
        if let Some(resume) = patch.generated_resume {
            self.generated_resume = Some(resume);
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_patch_does_not_clobber_evaluation_fields() {
        let mut artifact = Artifact::default();
        artifact.merge(
            ArtifactPatch::evaluation(82, VisaRisk::Low, "Strong fit", "Hiring_Manager"),
            Utc::now(),
        );
        artifact.merge(ArtifactPatch::generation("# Tailored Resume"), Utc::now());

        assert_eq!(artifact.match_score, Some(82));
        assert_eq!(artifact.visa_risk, Some(VisaRisk::Low));
        assert_eq!(artifact.evaluated_by.as_deref(), Some("Hiring_Manager"));
        assert_eq!(artifact.generated_resume.as_deref(), Some("# Tailored Resume"));
    }

    #[test]
    fn test_evaluation_patch_does_not_clobber_generated_resume() {
        let mut artifact = Artifact::default();
        artifact.merge(ArtifactPatch::generation("# Resume v1"), Utc::now());
        artifact.merge(
            ArtifactPatch::evaluation(40, VisaRisk::Medium, "Weak", "AI_Evaluator"),
            Utc::now(),
        );

        assert_eq!(artifact.generated_resume.as_deref(), Some("# Resume v1"));
        assert_eq!(artifact.match_score, Some(40));
    }

    #[test]
    fn test_merge_stamps_updated_at() {
        let mut artifact = Artifact::default();
        let earlier = artifact.updated_at;
        let later = earlier + chrono::Duration::seconds(5);
        artifact.merge(ArtifactPatch::generation("x"), later);
        assert_eq!(artifact.updated_at, later);
    }
}
