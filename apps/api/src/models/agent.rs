use serde::{Deserialize, Serialize};

/// Which crew an agent was recruited into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CrewKind {
    #[default]
    Evaluation,
    Crafting,
}

/// A recruited AI agent: its persona and one-sentence focus.
/// Immutable once recruited for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    pub name: String,
    pub role: String,
    pub focus: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(default, rename = "crewType")]
    pub crew: CrewKind,
}

impl AgentProfile {
    pub fn new(name: &str, role: &str, focus: &str, emoji: &str, crew: CrewKind) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            focus: focus.to_string(),
            emoji: emoji.to_string(),
            crew,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_profile_parses_panel_reply_shape() {
        // The shape the panel-recruitment call returns.
        let json = r#"{
            "name": "Talent_Scout",
            "role": "Technical Recruiter",
            "focus": "Hard Skills Match",
            "emoji": "🔍",
            "crewType": "EVALUATION"
        }"#;
        let agent: AgentProfile = serde_json::from_str(json).unwrap();
        assert_eq!(agent.name, "Talent_Scout");
        assert_eq!(agent.crew, CrewKind::Evaluation);
    }

    #[test]
    fn test_crew_kind_defaults_to_evaluation_when_missing() {
        let json = r#"{"name": "A", "role": "B", "focus": "C"}"#;
        let agent: AgentProfile = serde_json::from_str(json).unwrap();
        assert_eq!(agent.crew, CrewKind::Evaluation);
        assert!(agent.emoji.is_empty());
    }
}
