//! Agent panel recruitment — one structured call that staffs both crews
//! (3 evaluation gatekeepers, 3 résumé crafters) from the résumé and the
//! user's target-role intent.
//!
//! Recruitment failures are never fatal: a missing key or an unparseable
//! reply falls back to the deterministic default panel.

use tracing::{error, warn};

use crate::llm_client::gate::CallGate;
use crate::llm_client::sanitize::extract_json;
use crate::llm_client::{GenerateRequest, LlmError, REASONING_MODEL};
use crate::logbox::{LogKind, LogSink};
use crate::models::agent::{AgentProfile, CrewKind};

/// The default panel used when recruitment is unavailable.
pub fn fallback_panel() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new(
            "Talent_Scout",
            "Technical Recruiter",
            "Hard Skills Match",
            "🔍",
            CrewKind::Evaluation,
        ),
        AgentProfile::new(
            "Culture_Fit_AI",
            "HR Specialist",
            "Soft Skills & Values",
            "🤝",
            CrewKind::Evaluation,
        ),
        AgentProfile::new(
            "Hiring_Manager",
            "Decision Maker",
            "Final Verdict",
            "⚖️",
            CrewKind::Evaluation,
        ),
        AgentProfile::new(
            "Resume_Architect",
            "Career Strategist",
            "Gap Analysis",
            "📐",
            CrewKind::Crafting,
        ),
        AgentProfile::new(
            "Lead_Writer",
            "Copywriter",
            "Content Drafting",
            "✍️",
            CrewKind::Crafting,
        ),
        AgentProfile::new(
            "QC_Specialist",
            "Editor",
            "Formatting & ATS",
            "✅",
            CrewKind::Crafting,
        ),
    ]
}

/// Recruits the six-agent panel for this (résumé, intent) session.
pub async fn recruit_panel(
    gate: &CallGate,
    resume_text: &str,
    user_intent: &str,
    log: &LogSink<'_>,
) -> Vec<AgentProfile> {
    let prompt = super::prompts::build_panel_prompt(resume_text, user_intent);
    let request = GenerateRequest::text(prompt).expect_json();

    match gate.submit(REASONING_MODEL, &request).await {
        Ok(reply) => {
            let text = reply.text_or("[]");
            match serde_json::from_str::<Vec<AgentProfile>>(extract_json(&text)) {
                Ok(agents) if !agents.is_empty() => {
                    log(
                        LogKind::Success,
                        &format!("Recruited a panel of {} agents.", agents.len()),
                        None,
                    );
                    agents
                }
                Ok(_) | Err(_) => {
                    error!("panel reply did not contain usable agents");
                    log(
                        LogKind::Warning,
                        "Agent recruitment reply was unusable. Using the default panel.",
                        None,
                    );
                    fallback_panel()
                }
            }
        }
        Err(LlmError::MissingKey) => {
            warn!("no API key available — using default panel");
            log(
                LogKind::Warning,
                "No API key available. Using the default panel.",
                None,
            );
            fallback_panel()
        }
        Err(err) => {
            error!("failed to recruit agents: {err}");
            log(
                LogKind::Warning,
                "Agent recruitment failed. Using the default panel.",
                None,
            );
            fallback_panel()
        }
    }
}

/// The evaluation trio from a recruited panel, in recruitment order.
pub fn evaluation_crew_configs(agents: &[AgentProfile]) -> Vec<AgentProfile> {
    let evaluation: Vec<AgentProfile> = agents
        .iter()
        .filter(|agent| agent.crew == CrewKind::Evaluation)
        .cloned()
        .collect();
    if evaluation.is_empty() {
        // Panels recruited before crew tagging existed: first three agents.
        agents.iter().take(3).cloned().collect()
    } else {
        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::gate::{CallGate, GateConfig};
    use crate::llm_client::testing::ScriptedBackend;
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

    #[test]
    fn test_fallback_panel_has_both_crews() {
        let panel = fallback_panel();
        assert_eq!(panel.len(), 6);
        let evaluation = panel
            .iter()
            .filter(|a| a.crew == CrewKind::Evaluation)
            .count();
        let crafting = panel.iter().filter(|a| a.crew == CrewKind::Crafting).count();
        assert_eq!(evaluation, 3);
        assert_eq!(crafting, 3);
    }

    #[tokio::test]
    async fn test_recruit_parses_panel_reply() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text(
            r#"[
                {"name": "Skeptic", "role": "Recruiter", "focus": "Skills", "emoji": "🧐", "crewType": "EVALUATION"},
                {"name": "Writer", "role": "Copywriter", "focus": "Impact", "emoji": "✍️", "crewType": "CRAFTING"}
            ]"#,
        );
        let gate = instant_gate(backend);
        let log = |_: LogKind, _: &str, _: Option<&str>| {};

        let panel = recruit_panel(&gate, "resume", "intent", &log).await;
        assert_eq!(panel.len(), 2);
        assert_eq!(panel[0].name, "Skeptic");
        assert_eq!(panel[1].crew, CrewKind::Crafting);
    }

    #[tokio::test]
    async fn test_recruit_falls_back_on_unparseable_reply() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_text("I have assembled a wonderful team for you!");
        let gate = instant_gate(backend);
        let log = |_: LogKind, _: &str, _: Option<&str>| {};

        let panel = recruit_panel(&gate, "resume", "intent", &log).await;
        assert_eq!(panel.len(), 6);
        assert_eq!(panel[0].name, "Talent_Scout");
    }

    #[tokio::test]
    async fn test_recruit_falls_back_when_key_missing() {
        let backend = Arc::new(ScriptedBackend::new());
        backend.push_err(LlmError::MissingKey);
        let gate = instant_gate(backend);
        let log = |_: LogKind, _: &str, _: Option<&str>| {};

        let panel = recruit_panel(&gate, "resume", "intent", &log).await;
        assert_eq!(panel.len(), 6);
    }

    #[test]
    fn test_evaluation_crew_configs_filters_by_crew_kind() {
        let configs = evaluation_crew_configs(&fallback_panel());
        assert_eq!(configs.len(), 3);
        assert!(configs.iter().all(|a| a.crew == CrewKind::Evaluation));
    }
}
