// All LLM prompt builders for the generation module.
// Input budgets are clipped per call site to keep requests bounded.

use crate::llm_client::prompts::clip;
use crate::models::job::Job;

/// Strategy stage: blueprint the transformation toward one job.
pub fn architect_prompt(resume: &str, job: &Job) -> String {
    format!(
        r#"SYSTEM ROLE: You are the 'Resume Strategist' & Subject Matter Expert.
TASK: Blueprint the transformation of this resume to target {title}.

OBJECTIVES:
1. **ATS Optimization**: Extract top 5 hard keywords from the Job Description that are missing or buried in the resume.
2. **Narrative Alignment**: How should the candidate's summary change to mirror the company's mission?
3. **Gap Bridging**: If they lack a specific skill, identify a transferrable skill to highlight instead.

INPUTS:
- Target: {title} at {company}
- Job Description: {description}
- Resume: {resume}

OUTPUT:
A concise strategic plan.
- "Keywords to inject: [List]"
- "Rewrite bullet X to prove [Skill Y]"
- "Rephrase Summary to emphasize [Goal Z]""#,
        title = job.title,
        company = job.company,
        description = clip(&job.description, 3000),
        resume = clip(resume, 4000),
    )
}

/// Draft stage: rewrite content against the strategy without inventing facts.
pub fn writer_prompt(strategy: &str, resume: &str) -> String {
    format!(
        r#"SYSTEM ROLE: You are the 'Impact Resume Writer'.
TASK: Rewrite the resume content based on the Strategy.

CRITICAL RULES:
1. **Google XYZ Formula**: Rewrite passive bullets (e.g., "Responsible for sales") into high-impact bullets ("Achieved $1M revenue [X] by implementing CRM [Y] leading to 20% growth [Z]").
2. **Fact Preservation**: Do not invent numbers. If numbers are missing, use qualitative impact (e.g., "significantly reduced latency").
3. **Structure**: Keep the original Markdown structure (Headers, Dates). Only edit the *content* of the bullets and summary.

INPUTS:
- Strategy: {strategy}
- ORIGINAL RESUME:
"""
{resume}
"""

OUTPUT:
The full markdown text of the upgraded resume."#,
        strategy = strategy,
        resume = clip(resume, 4000),
    )
}

/// Critic half of the refine loop: audit the draft, return a structured verdict.
pub fn critic_prompt(current_draft: &str, job_description: &str, history: &str) -> String {
    format!(
        r#"SYSTEM ROLE: You are the 'Toughest Hiring Manager'.
TASK: Audit the draft. Would you interview this person?

CHECKLIST:
1. **So What?**: Do the bullet points show results, or just tasks?
2. **Keywords**: Are the top JD requirements explicitly mentioned in the text?
3. **Formatting**: Is it clean Markdown?

INPUTS:
- Job Description: {description}
- Draft: {draft}
- History: "{history}"

OUTPUT CONTRACT:
Return a SINGLE JSON Object:
{{
  "score": integer (0-100),
  "critique": "string (Be harsh. e.g., 'Too generic', 'Missing Python').",
  "revisionInstructions": "string (Specific: 'Rewrite the 2nd job bullets to include metrics.')"
}}"#,
        description = clip(job_description, 2000),
        draft = clip(current_draft, 4000),
        history = if history.is_empty() { "None" } else { history },
    )
}

/// Reviser half of the refine loop: apply the critic's instructions.
pub fn reviser_prompt(current_draft: &str, instructions: &str, history: &str) -> String {
    format!(
        r#"SYSTEM ROLE: You are the 'Expert Reviser'.
TASK: Fix the resume based on the Hiring Manager's feedback.

INPUTS:
- Instructions: {instructions}
- History: "{history}"
- Draft:
"""
{draft}
"""

INSTRUCTIONS:
- Apply the instructions precisely.
- If asked to add metrics and none exist, use strong action verbs (Spearheaded, Optimized, Engineered) to imply impact.
- Output the FULL Markdown."#,
        instructions = instructions,
        history = history,
        draft = current_draft,
    )
}

/// Format stage: polish for readability and ATS parsing.
pub fn editor_prompt(draft: &str) -> String {
    format!(
        r#"SYSTEM ROLE: You are the 'Chief Editor'.
TASK: Polish the resume for readability and ATS parsing.

INPUTS:
- Draft Resume: {draft}

REQUIREMENTS:
- **Clean Markdown**: Ensure consistent # Headers and - Bullets.
- **No Fluff**: Remove conversational filler ("Here is the resume").
- **Formatting**: Ensure dates and locations are consistently formatted.

OUTPUT:
Only the Markdown content."#,
        draft = draft,
    )
}

/// Verify stage: final gate before the document is accepted.
pub fn qa_prompt(markdown: &str, job_description: &str) -> String {
    format!(
        r#"SYSTEM ROLE: You are the 'Final Gatekeeper'.
TASK: Verify the resume is ready for submission.

INPUTS:
- Job Snippet: {description}
- Draft Resume: {markdown}

OUTPUT:
Return the FINAL polished Markdown.

GUARDRAILS:
- Do NOT output "Here is the resume".
- Do NOT wrap in ```markdown.
- The output must be PURE Markdown content ready to save as .md file."#,
        description = clip(job_description, 1000),
        markdown = markdown,
    )
}

/// Prompt for the spoken job-match summary.
pub fn audio_summary_prompt(job: &Job) -> String {
    format!(
        r#"Generate a 15-second enthusiastic audio summary for this job match.
Role: {title} at {company}.
Match Score: {score}.
Reasoning: {reasoning}.
Tone: Professional Career Coach."#,
        title = job.title,
        company = job.company,
        score = job.match_score.unwrap_or(0),
        reasoning = job.reasoning.as_deref().unwrap_or("Not yet evaluated"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> Job {
        let mut job: Job = serde_json::from_str(
            r#"{"id":"j1","title":"Platform Engineer","company":"Initech"}"#,
        )
        .unwrap();
        job.description = "Own the deployment platform.".to_string();
        job
    }

    #[test]
    fn test_architect_prompt_targets_the_job() {
        let prompt = architect_prompt("my resume", &sample_job());
        assert!(prompt.contains("Platform Engineer at Initech"));
        assert!(prompt.contains("my resume"));
    }

    #[test]
    fn test_critic_prompt_substitutes_none_for_empty_history() {
        let prompt = critic_prompt("draft", "jd", "");
        assert!(prompt.contains(r#"History: "None""#));
    }

    #[test]
    fn test_critic_prompt_carries_history() {
        let prompt = critic_prompt("draft", "jd", "Iteration 1 Critique: too generic");
        assert!(prompt.contains("Iteration 1 Critique: too generic"));
    }

    #[test]
    fn test_qa_prompt_clips_job_description() {
        let long_jd = "q".repeat(5000);
        let prompt = qa_prompt("# Resume", &long_jd);
        assert!(!prompt.contains(&"q".repeat(1001)));
    }

    #[test]
    fn test_audio_prompt_reads_evaluation_fields() {
        let mut job = sample_job();
        job.match_score = Some(92);
        job.reasoning = Some("Perfect stack match".to_string());
        let prompt = audio_summary_prompt(&job);
        assert!(prompt.contains("Match Score: 92"));
        assert!(prompt.contains("Perfect stack match"));
    }
}
