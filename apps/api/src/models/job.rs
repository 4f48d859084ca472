use serde::{Deserialize, Deserializer, Serialize};

/// Visa sponsorship risk for a posting.
///
/// CRITICAL: when a posting is silent on visa status the assessment defaults
/// to `Medium` — this is enforced in the deserializer, not just in prompt
/// text, so a synthesizer reply that omits or mangles the field can never
/// surface an optimistic `Low`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VisaRisk {
    Low,
    #[default]
    Medium,
    High,
}

impl<'de> Deserialize<'de> for VisaRisk {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "LOW" => VisaRisk::Low,
            "HIGH" => VisaRisk::High,
            // "MEDIUM" and anything unrecognized
            _ => VisaRisk::Medium,
        })
    }
}

/// Job lifecycle state.
/// NEW → PROCESSING → DONE | FAILED; FAILED is retryable back toward NEW.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[default]
    New,
    Processing,
    Done,
    Failed,
}

/// Sub-state of a job while the generation pipeline is running.
/// The five named phases plus the terminal marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationPhase {
    Strategy,
    Draft,
    Refine,
    Format,
    Verify,
    Done,
}

/// A job posting with its evaluation/generation state.
///
/// Descriptive fields are immutable after import; the analysis and
/// generation fields are owned by the orchestration layer and mutated only
/// when a stage completes or fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicants: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posted_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,

    // Analysis fields — unset until evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visa_risk: Option<VisaRisk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluated_by: Option<String>,

    #[serde(default)]
    pub status: JobStatus,

    // Generation fields — unset until the tailoring pipeline runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_phase: Option<GenerationPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_resume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_summary: Option<String>,
}

impl Job {
    /// Clears every mutable analysis/generation field, returning the job to
    /// its freshly-imported shape. Used when the résumé is replaced.
    pub fn reset_analysis(&mut self) {
        self.match_score = None;
        self.visa_risk = None;
        self.reasoning = None;
        self.evaluated_by = None;
        self.status = JobStatus::New;
        self.generation_phase = None;
        self.generated_resume = None;
        self.audio_summary = None;
    }
}
