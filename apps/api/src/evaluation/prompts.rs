// All LLM prompt constants for the evaluation module.
// Score bands and the visa guide live here — scoring semantics are part of
// the prompt contract, not code logic.

use crate::llm_client::prompts::clip;
use crate::models::agent::AgentProfile;
use crate::models::job::Job;

pub const SCORING_RUBRIC: &str = r#"SCORING RUBRIC (0-100) - BE A SKEPTICAL GATEKEEPER:
- 95-100 (Top 1% Candidate): "Must Interview". Perfect hard skill match + Clear, quantified impact in similar industries.
- 85-94 (Strong Contender): All requirements met. Good domain fit. Resume proves value, not just tasks.
- 70-84 (Qualified): Meets baseline requirements. Lacks "Wow" factor or specific domain authority.
- 50-69 (Weak/Generic): Key skills missing OR Resume is too generic/passive. "Responsible for" instead of "Achieved".
- <50 (Reject): Fundamental mismatch in seniority, visa status, or technical stack."#;

pub const VISA_GUIDE: &str = r#"VISA RISK ASSESSMENT (Conservative):
- LOW: US Citizen/GC OR Job explicitly says "Sponsorship Available".
- MEDIUM: Job is silent on visa. (Assume Medium risk for H1B candidates).
- HIGH: Job says "US Citizen Only", "Clearance Required", "No Sponsorship", or "Locals Only"."#;

/// System prompt for every specialist stage in the sequential crew.
pub const AGENT_SYSTEM_INSTRUCTION: &str = r#"SYSTEM ROLE: You are a specialized evaluator in a recruitment panel.
TASK: specific_evaluation
INPUTS: Candidate Resume, Job Description, Prior Agent Notes.

RULES:
1. Adhere STRICTLY to your assigned 'focus'.
2. Be critical. Look for reasons to REJECT. If the candidate survives your scrutiny, they are a good fit.
3. Max 60 words.
4. Do not hallucinate credentials."#;

const FINAL_AGENT_SYSTEM_TEMPLATE: &str = r#"SYSTEM ROLE: You are the Hiring Decision Maker.
TASK: Finalize the candidate's suitability based on team feedback.

INPUTS: Resume, Job Details, Team Analyses.

{scoring_rubric}

{visa_guide}

OUTPUT CONTRACT:
Return a SINGLE JSON Object.
Schema:
{
  "matchScore": integer (0-100),
  "visaRisk": "LOW" | "MEDIUM" | "HIGH",
  "reasoning": "string (Max 25 words. Be blunt. Why should we interview or reject?)"
}"#;

/// System prompt for the synthesizer stage.
pub fn final_agent_system() -> String {
    FINAL_AGENT_SYSTEM_TEMPLATE
        .replace("{scoring_rubric}", SCORING_RUBRIC)
        .replace("{visa_guide}", VISA_GUIDE)
}

const BATCH_EVALUATION_SYSTEM_TEMPLATE: &str = r#"SYSTEM ROLE: You are an Expert High-Volume Recruiter.
TASK: Rapidly triage job descriptions against a candidate profile.

{scoring_rubric}

{visa_guide}

OUTPUT CONTRACT:
Return ONLY a JSON ARRAY of results.
Required Fields per Item:
- id: (String) Same as input job ID.
- matchScore: (Integer) 0-100. Be conservative. If resume is generic, score < 75.
- visaRisk: (String) LOW, MEDIUM, or HIGH.
- reasoning: (String) Specific gap or strength. (e.g., "Missing React Native exp", "Strong Fintech background").
- evaluatedBy: (String) "AI_Evaluator".

GUARDRAILS:
- If Job Description is empty/invalid, return score 0.
- If Visa status is unclear but candidate is international, mark MEDIUM."#;

/// System prompt for whole-batch evaluation.
pub fn batch_evaluation_system() -> String {
    BATCH_EVALUATION_SYSTEM_TEMPLATE
        .replace("{scoring_rubric}", SCORING_RUBRIC)
        .replace("{visa_guide}", VISA_GUIDE)
}

/// Task prompt for one stage of the sequential crew. Earlier stages' outputs
/// ride along as "prior team notes" so later stages build on them.
pub fn agent_task_prompt(
    resume_text: &str,
    job: &Job,
    agent: &AgentProfile,
    previous_analyses: &[String],
) -> String {
    let notes = if previous_analyses.is_empty() {
        "None.".to_string()
    } else {
        previous_analyses.join("\n\n")
    };
    format!(
        r#"CONTEXT:
- Agent Name: {name}
- Agent Focus: {focus}

CANDIDATE RESUME:
"""
{resume}
"""

JOB DETAILS:
- Title: {title}
- Company: {company}
- Description: {description}

PRIOR TEAM NOTES:
{notes}

INSTRUCTION:
Provide your analysis. Is this candidate in the top 10% of applicants for this specific role? Why/Why not?"#,
        name = agent.name,
        focus = agent.focus,
        resume = clip(resume_text, 3000),
        title = job.title,
        company = job.company,
        description = clip(&job.description, 2000),
    )
}

/// Prompt for recruiting the six-agent panel (3 evaluation, 3 crafting).
pub fn build_panel_prompt(resume_text: &str, user_intent: &str) -> String {
    format!(
        r#"SYSTEM ROLE: You are an Elite Talent Strategist at a top executive search firm.
TASK:
1. Analyze the Candidate's "Latest Role" and "Key Achievements".
2. Combine with "User Intent" to identify the *Ideal Target Position*.
3. Recruit TWO distinct AI Crews:
   - Crew A: **Evaluation Crew** (3 Agents). STRICT gatekeepers.
   - Crew B: **Resume Crafting Crew** (3 Agents). World-class resume writers.

INPUTS:
- User Intent: "{intent}"
- Resume Snippet: "{resume}..."

OUTPUT CONTRACT:
Return a JSON Array of exactly 6 Agent objects.
- Indices 0-2: Evaluation Crew (e.g., "Skeptical Tech Recruiter", "Hiring Manager").
- Indices 3-5: Resume Crafting Crew.
  - Agent 3: **Domain Strategy Lead** (e.g., "Fintech Product Director"). MUST be a subject matter expert.
  - Agent 4: **Impact Writer** (Specialist in converting tasks to quantitative achievements).
  - Agent 5: **ATS Optimizer** (Ensures keyword density without stuffing).

Schema:
[
  {{
    "name": "string",
    "role": "string",
    "focus": "string",
    "emoji": "string",
    "crewType": "EVALUATION" | "CRAFTING"
  }}
]"#,
        intent = user_intent,
        resume = clip(resume_text, 2000),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::CrewKind;

    fn sample_job() -> Job {
        let mut job: Job =
            serde_json::from_str(r#"{"id":"j1","title":"Python Backend","company":"Acme"}"#)
                .unwrap();
        job.description = "Build APIs in Python.".to_string();
        job
    }

    #[test]
    fn test_final_agent_system_embeds_rubric_and_visa_guide() {
        let system = final_agent_system();
        assert!(system.contains("SCORING RUBRIC"));
        assert!(system.contains("VISA RISK ASSESSMENT"));
        assert!(!system.contains("{scoring_rubric}"));
    }

    #[test]
    fn test_batch_system_embeds_rubric_and_visa_guide() {
        let system = batch_evaluation_system();
        assert!(system.contains("95-100"));
        assert!(system.contains("MEDIUM"));
        assert!(!system.contains("{visa_guide}"));
    }

    #[test]
    fn test_agent_task_prompt_carries_prior_notes() {
        let agent = AgentProfile::new("Scout", "Recruiter", "Skills", "🔍", CrewKind::Evaluation);
        let notes = vec!["First note".to_string(), "Second note".to_string()];
        let prompt = agent_task_prompt("resume text", &sample_job(), &agent, &notes);
        assert!(prompt.contains("First note"));
        assert!(prompt.contains("Second note"));
        assert!(prompt.contains("Python Backend"));
    }

    #[test]
    fn test_agent_task_prompt_without_notes_says_none() {
        let agent = AgentProfile::new("Scout", "Recruiter", "Skills", "🔍", CrewKind::Evaluation);
        let prompt = agent_task_prompt("resume text", &sample_job(), &agent, &[]);
        assert!(prompt.contains("PRIOR TEAM NOTES:\nNone."));
    }

    #[test]
    fn test_panel_prompt_includes_intent_and_resume() {
        let prompt = build_panel_prompt("my resume body", "Staff Engineer roles");
        assert!(prompt.contains("Staff Engineer roles"));
        assert!(prompt.contains("my resume body"));
    }
}
