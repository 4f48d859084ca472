//! Session orchestration — the only layer that mutates the job collection
//! and writes to the artifact cache.
//!
//! Flow on a completed stage: update the artifact (source of truth), then the
//! in-memory job row, then persist the job list. Everything here happens in
//! response to a completed or failed pipeline stage; pipelines themselves
//! never touch shared state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifacts::ArtifactCache;
use crate::chat::chat_with_jobs;
use crate::errors::AppError;
use crate::evaluation::batch::analyze_jobs_in_batch;
use crate::evaluation::crew::{build_crew, run_sequential, JobAnalysis};
use crate::evaluation::panel::{evaluation_crew_configs, fallback_panel, recruit_panel};
use crate::evaluation::rubric;
use crate::generation::audio::generate_audio_summary;
use crate::generation::pipeline::{generate_tailored_resume, GenerationHooks};
use crate::llm_client::gate::CallGate;
use crate::llm_client::LlmError;
use crate::logbox::{LogBuffer, LogEntry, LogKind};
use crate::models::agent::AgentProfile;
use crate::models::artifact::ArtifactPatch;
use crate::models::chat::ChatMessage;
use crate::models::job::{Job, JobStatus};
use crate::models::resume::ResumeProfile;
use crate::search::JobSearcher;
use crate::stores::KvStore;

pub mod handlers;
pub mod ingest;

/// Default number of NEW jobs pulled into one analysis run.
pub const DEFAULT_BATCH_SIZE: usize = 9;

const RESUME_KEY: &str = "safesubmit_resume";

fn jobs_key(fingerprint: &str) -> String {
    format!("safesubmit_jobs_{fingerprint}")
}

fn intent_key(fingerprint: &str) -> String {
    format!("safesubmit_intent_{fingerprint}")
}

/// Which evaluation execution mode a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// One call covering the whole batch.
    #[default]
    Batch,
    /// Full specialist→synthesizer crew per job.
    Sequential,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Default)]
struct SessionInner {
    resume: Option<ResumeProfile>,
    intent: String,
    /// Derived rubric for the current (résumé, intent) pair.
    instructions: Option<String>,
    agents: Vec<AgentProfile>,
    jobs: Vec<Job>,
}

/// Releases a job's busy claim when the pipeline finishes, however it exits.
#[derive(Debug)]
struct BusyGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().expect("busy set poisoned").remove(&self.id);
    }
}

pub struct SessionService {
    store: Arc<dyn KvStore>,
    cache: ArtifactCache,
    gate: Arc<CallGate>,
    searcher: Arc<dyn JobSearcher>,
    inner: Mutex<SessionInner>,
    /// Jobs with an in-flight generation pipeline. One pipeline per job —
    /// a second entry is a caller bug we refuse rather than race.
    generating: Mutex<HashSet<String>>,
    logs: LogBuffer,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn KvStore>,
        gate: Arc<CallGate>,
        searcher: Arc<dyn JobSearcher>,
    ) -> Self {
        Self {
            cache: ArtifactCache::new(store.clone()),
            store,
            gate,
            searcher,
            inner: Mutex::new(SessionInner::default()),
            generating: Mutex::new(HashSet::new()),
            logs: LogBuffer::default(),
        }
    }

    fn sink(&self) -> impl Fn(LogKind, &str, Option<&str>) + Send + Sync + '_ {
        move |kind, message, agent| self.logs.push(kind, message, agent)
    }

    /// Restores a prior session from the store: résumé, intent, and the
    /// fingerprint-scoped job list. Jobs stuck in PROCESSING from an
    /// interrupted run are recovered to NEW.
    pub async fn restore(&self) -> anyhow::Result<()> {
        let Some(raw) = self.store.get(RESUME_KEY).await? else {
            return Ok(());
        };
        let resume: ResumeProfile = match serde_json::from_str(&raw) {
            Ok(resume) => resume,
            Err(err) => {
                warn!("stored resume unreadable, starting fresh: {err}");
                return Ok(());
            }
        };

        let intent = self
            .store
            .get(&intent_key(&resume.fingerprint))
            .await?
            .unwrap_or_default();

        let mut jobs: Vec<Job> = match self.store.get(&jobs_key(&resume.fingerprint)).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };
        for job in &mut jobs {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::New;
            }
        }

        let instructions = (!intent.is_empty())
            .then(|| rubric::compose_instructions(&resume.text, &intent));

        {
            let mut inner = self.inner.lock().expect("session poisoned");
            inner.intent = intent;
            inner.instructions = instructions;
            inner.jobs = jobs;
            inner.resume = Some(resume);
        }
        self.logs.push(LogKind::Success, "Session restored.", None);
        Ok(())
    }

    /// Uploads (or replaces) the résumé. A changed fingerprint resets every
    /// job's analysis fields and drops the recruited panel, rubric, and
    /// intent — results scoped to the old fingerprint are orphaned, not
    /// deleted.
    pub async fn upload_resume(
        &self,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<ResumeProfile, AppError> {
        let profile = ingest::build_profile(file_name, bytes)?;

        {
            let mut inner = self.inner.lock().expect("session poisoned");
            let replaced = inner
                .resume
                .as_ref()
                .is_some_and(|current| current.fingerprint != profile.fingerprint);
            if replaced {
                for job in &mut inner.jobs {
                    job.reset_analysis();
                }
                inner.agents.clear();
                inner.instructions = None;
                inner.intent.clear();
                info!("resume replaced — analysis state reset");
            }
            inner.resume = Some(profile.clone());
        }

        if let Ok(raw) = serde_json::to_string(&profile) {
            if let Err(err) = self.store.set(RESUME_KEY, &raw).await {
                warn!("failed to persist resume: {err}");
            }
        }

        // A previously-used résumé brings its stored intent back with it.
        if let Ok(Some(stored_intent)) = self.store.get(&intent_key(&profile.fingerprint)).await {
            let mut inner = self.inner.lock().expect("session poisoned");
            if inner.intent.is_empty() && !stored_intent.is_empty() {
                inner.instructions = Some(rubric::compose_instructions(
                    &profile.text,
                    &stored_intent,
                ));
                inner.intent = stored_intent;
            }
        }

        self.persist_jobs().await;
        self.logs.push(
            LogKind::Success,
            &format!("Resume '{file_name}' uploaded."),
            None,
        );
        Ok(profile)
    }

    /// Sets the target-role intent and derives the evaluation rubric.
    /// Changing intent invalidates prior scores — jobs analyzed under
    /// different intents are not comparable.
    pub async fn set_intent(&self, intent: &str) -> Result<(), AppError> {
        let fingerprint = {
            let mut inner = self.inner.lock().expect("session poisoned");
            let resume = inner.resume.clone().ok_or_else(|| {
                AppError::Validation("Upload a resume before setting an intent".to_string())
            })?;

            if inner.intent != intent && !inner.intent.is_empty() {
                for job in &mut inner.jobs {
                    job.match_score = None;
                    job.visa_risk = None;
                    job.reasoning = None;
                    job.evaluated_by = None;
                    if job.status == JobStatus::Failed {
                        job.status = JobStatus::New;
                    }
                }
                info!("intent changed — prior scores invalidated");
            }

            inner.intent = intent.to_string();
            inner.instructions = Some(rubric::compose_instructions(&resume.text, intent));
            resume.fingerprint
        };

        if let Err(err) = self.store.set(&intent_key(&fingerprint), intent).await {
            warn!("failed to persist intent: {err}");
        }
        self.persist_jobs().await;
        self.logs.push(
            LogKind::Info,
            "Target intent set. Evaluation rubric derived.",
            None,
        );
        Ok(())
    }

    /// Imports jobs, deduplicating by id and hydrating each new job from the
    /// artifact cache so already-analyzed work surfaces without any call.
    pub async fn import_jobs(&self, incoming: Vec<Job>) -> Result<ImportSummary, AppError> {
        let (existing_ids, fingerprint) = {
            let inner = self.inner.lock().expect("session poisoned");
            let ids: HashSet<String> = inner.jobs.iter().map(|job| job.id.clone()).collect();
            (ids, inner.resume.as_ref().map(|r| r.fingerprint.clone()))
        };

        let mut fresh = Vec::new();
        let mut skipped = 0usize;
        let mut seen = existing_ids;
        for job in incoming {
            if !seen.insert(job.id.clone()) {
                skipped += 1;
                continue;
            }
            let mut job = match &fingerprint {
                Some(fingerprint) => self
                    .cache
                    .hydrate(job, fingerprint)
                    .await
                    .map_err(AppError::Internal)?,
                None => job,
            };
            // Never import a job mid-flight from cached state.
            if job.status == JobStatus::Processing {
                job.status = JobStatus::New;
            }
            fresh.push(job);
        }

        let imported = fresh.len();
        {
            let mut inner = self.inner.lock().expect("session poisoned");
            inner.jobs.extend(fresh);
        }
        self.persist_jobs().await;
        self.logs.push(
            LogKind::Success,
            &format!("Imported {imported} jobs ({skipped} duplicates skipped)."),
            None,
        );
        Ok(ImportSummary { imported, skipped })
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.inner.lock().expect("session poisoned").jobs.clone()
    }

    pub fn agents(&self) -> Vec<AgentProfile> {
        self.inner.lock().expect("session poisoned").agents.clone()
    }

    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.logs.snapshot()
    }

    /// Recruits the agent panel once per session; subsequent calls return
    /// the existing panel unchanged.
    pub async fn recruit_agents(&self) -> Result<Vec<AgentProfile>, AppError> {
        let (resume_text, intent) = {
            let inner = self.inner.lock().expect("session poisoned");
            if !inner.agents.is_empty() {
                return Ok(inner.agents.clone());
            }
            let resume = inner.resume.as_ref().ok_or_else(|| {
                AppError::Validation("Upload a resume before recruiting agents".to_string())
            })?;
            (resume.text.clone(), inner.intent.clone())
        };

        let log = self.sink();
        let panel = recruit_panel(&self.gate, &resume_text, &intent, &log).await;

        let mut inner = self.inner.lock().expect("session poisoned");
        if inner.agents.is_empty() {
            inner.agents = panel;
        }
        Ok(inner.agents.clone())
    }

    /// Evaluates the next batch of unanalyzed jobs.
    ///
    /// Batch mode issues one structured call for the whole set; sequential
    /// mode runs the full crew per job with partial-failure isolation. Both
    /// write artifacts as results land; a missing credential skips the run
    /// with a warning instead of failing anything.
    pub async fn analyze_next_batch(
        &self,
        batch_size: Option<usize>,
        mode: AnalysisMode,
    ) -> Result<Vec<JobAnalysis>, AppError> {
        let size = batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1);

        let (resume, instructions, selected, agents) = {
            let mut inner = self.inner.lock().expect("session poisoned");
            let resume = inner.resume.clone().ok_or_else(|| {
                AppError::Validation("Upload a resume before analyzing jobs".to_string())
            })?;
            let instructions = inner.instructions.clone().unwrap_or_else(|| {
                let derived = rubric::compose_instructions(&resume.text, &inner.intent);
                inner.instructions = Some(derived.clone());
                derived
            });
            let selected: Vec<Job> = inner
                .jobs
                .iter()
                .filter(|job| job.status == JobStatus::New && job.match_score.is_none())
                .take(size)
                .cloned()
                .collect();
            for job in &mut inner.jobs {
                if selected.iter().any(|s| s.id == job.id) {
                    job.status = JobStatus::Processing;
                }
            }
            (resume, instructions, selected, inner.agents.clone())
        };

        if selected.is_empty() {
            self.logs
                .push(LogKind::Info, "No unanalyzed jobs in queue.", None);
            return Ok(Vec::new());
        }
        self.persist_jobs().await;

        let log = self.sink();
        let (results, missing_key) = match mode {
            AnalysisMode::Batch => {
                match analyze_jobs_in_batch(&self.gate, &instructions, &selected, &log).await {
                    Ok(results) => (results, false),
                    Err(LlmError::MissingKey) => (Vec::new(), true),
                    Err(err) => {
                        self.mark_jobs(&selected, JobStatus::Failed);
                        self.persist_jobs().await;
                        self.logs.push(
                            LogKind::Error,
                            "Batch analysis failed. Jobs marked for retry.",
                            None,
                        );
                        return Err(AppError::Llm(format!("batch evaluation failed: {err}")));
                    }
                }
            }
            AnalysisMode::Sequential => {
                let configs = if agents.is_empty() {
                    evaluation_crew_configs(&fallback_panel())
                } else {
                    evaluation_crew_configs(&agents)
                };
                let crew = build_crew(configs)?;
                let outcome =
                    run_sequential(&crew, &self.gate, &selected, &resume.text, &log).await;
                (outcome.results, outcome.skipped_for_missing_key)
            }
        };

        if missing_key && results.is_empty() {
            self.logs
                .push(LogKind::Warning, "Missing API key. Analysis skipped.", None);
            self.mark_jobs(&selected, JobStatus::New);
            self.persist_jobs().await;
            return Ok(Vec::new());
        }

        // Artifact first (source of truth), then the job rows.
        for analysis in &results {
            if let Err(err) = self
                .cache
                .put(
                    &resume.fingerprint,
                    &analysis.id,
                    ArtifactPatch::evaluation(
                        analysis.match_score,
                        analysis.visa_risk,
                        &analysis.reasoning,
                        &analysis.evaluated_by,
                    ),
                )
                .await
            {
                warn!("failed to cache evaluation for {}: {err}", analysis.id);
            }
        }

        {
            let mut inner = self.inner.lock().expect("session poisoned");
            for job in &mut inner.jobs {
                if let Some(analysis) = results.iter().find(|r| r.id == job.id) {
                    job.match_score = Some(analysis.match_score);
                    job.visa_risk = Some(analysis.visa_risk);
                    job.reasoning = Some(analysis.reasoning.clone());
                    job.evaluated_by = Some(analysis.evaluated_by.clone());
                    // Analyzed but not generated: NEW, so nothing spins.
                    job.status = JobStatus::New;
                } else if selected.iter().any(|s| s.id == job.id)
                    && job.status == JobStatus::Processing
                {
                    job.status = if missing_key {
                        JobStatus::New
                    } else {
                        JobStatus::Failed
                    };
                }
            }
        }
        self.persist_jobs().await;

        self.logs.push(
            LogKind::Success,
            &format!("Analysis run complete: {} results.", results.len()),
            None,
        );
        Ok(results)
    }

    /// Runs the tailoring pipeline for one job. Guarded by a per-job busy
    /// flag; success caches the generation artifact, failure caches nothing.
    pub async fn generate_for_job(&self, job_id: &str) -> Result<Job, AppError> {
        let _busy = self.claim_job(job_id)?;

        let (resume, job_snapshot) = {
            let mut inner = self.inner.lock().expect("session poisoned");
            let resume = inner.resume.clone().ok_or_else(|| {
                AppError::Validation("Upload a resume before generating".to_string())
            })?;
            let job = inner
                .jobs
                .iter_mut()
                .find(|job| job.id == job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            job.status = JobStatus::Processing;
            job.generation_phase = None;
            (resume, job.clone())
        };
        self.persist_jobs().await;

        let log = self.sink();
        let on_phase = |phase: crate::models::job::GenerationPhase| {
            let mut inner = self.inner.lock().expect("session poisoned");
            if let Some(job) = inner.jobs.iter_mut().find(|job| job.id == job_id) {
                job.generation_phase = Some(phase);
            }
        };
        let hooks = GenerationHooks {
            on_phase: &on_phase,
            log: &log,
        };

        match generate_tailored_resume(&self.gate, &job_snapshot, &resume.text, &hooks).await {
            Ok(markdown) => {
                if let Err(err) = self
                    .cache
                    .put(
                        &resume.fingerprint,
                        job_id,
                        ArtifactPatch::generation(&markdown),
                    )
                    .await
                {
                    warn!("failed to cache generated resume for {job_id}: {err}");
                }
                let updated = {
                    let mut inner = self.inner.lock().expect("session poisoned");
                    let job = inner
                        .jobs
                        .iter_mut()
                        .find(|job| job.id == job_id)
                        .expect("job vanished mid-generation");
                    job.generated_resume = Some(markdown);
                    job.status = JobStatus::Done;
                    job.clone()
                };
                self.persist_jobs().await;
                Ok(updated)
            }
            Err(LlmError::MissingKey) => {
                self.mark_job(job_id, JobStatus::New);
                self.persist_jobs().await;
                self.logs
                    .push(LogKind::Warning, "Missing API key. Generation skipped.", None);
                Err(AppError::Validation(
                    "An API key is required to generate resumes".to_string(),
                ))
            }
            Err(err) => {
                self.mark_job(job_id, JobStatus::Failed);
                self.persist_jobs().await;
                self.logs.push(
                    LogKind::Warning,
                    "Resume generation failed. Please retry.",
                    None,
                );
                Err(AppError::Llm(format!("generation failed: {err}")))
            }
        }
    }

    /// Resets a FAILED job so its pipeline can re-enter from the top.
    pub async fn retry_job(&self, job_id: &str) -> Result<Job, AppError> {
        let job = {
            let mut inner = self.inner.lock().expect("session poisoned");
            let job = inner
                .jobs
                .iter_mut()
                .find(|job| job.id == job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            if job.status != JobStatus::Failed {
                return Err(AppError::Validation(
                    "Only failed jobs can be retried".to_string(),
                ));
            }
            job.status = JobStatus::New;
            job.generation_phase = None;
            job.clone()
        };
        self.persist_jobs().await;
        self.logs.push(
            LogKind::Info,
            &format!("Retry queued for {}.", job.company),
            None,
        );
        Ok(job)
    }

    /// Generates the spoken match summary for an evaluated job.
    pub async fn audio_for_job(&self, job_id: &str) -> Result<Option<String>, AppError> {
        let job = {
            let inner = self.inner.lock().expect("session poisoned");
            inner
                .jobs
                .iter()
                .find(|job| job.id == job_id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?
        };

        let audio = generate_audio_summary(&self.gate, &job).await;
        if audio.is_some() {
            let mut inner = self.inner.lock().expect("session poisoned");
            if let Some(job) = inner.jobs.iter_mut().find(|job| job.id == job_id) {
                job.audio_summary = audio.clone();
            }
        }
        Ok(audio)
    }

    /// One turn of the career-coach chat over the current job table.
    pub async fn chat(
        &self,
        history: &[ChatMessage],
        message: &str,
    ) -> Result<String, AppError> {
        let (resume_text, intent, jobs) = {
            let inner = self.inner.lock().expect("session poisoned");
            let resume = inner.resume.as_ref().ok_or_else(|| {
                AppError::Validation("Upload a resume before chatting".to_string())
            })?;
            (resume.text.clone(), inner.intent.clone(), inner.jobs.clone())
        };

        chat_with_jobs(
            &self.gate,
            self.searcher.as_ref(),
            history,
            message,
            &jobs,
            &resume_text,
            &intent,
        )
        .await
        .map_err(|err| AppError::Llm(format!("chat failed: {err}")))
    }

    /// Explicit session reset: deletes the résumé, intent, job list, and
    /// every artifact scoped to the current fingerprint.
    pub async fn reset(&self) -> Result<(), AppError> {
        let fingerprint = {
            let mut inner = self.inner.lock().expect("session poisoned");
            let fingerprint = inner.resume.as_ref().map(|r| r.fingerprint.clone());
            *inner = SessionInner::default();
            fingerprint
        };

        if let Some(fingerprint) = fingerprint {
            self.cache
                .clear(&fingerprint)
                .await
                .map_err(AppError::Internal)?;
            let _ = self.store.remove(&jobs_key(&fingerprint)).await;
            let _ = self.store.remove(&intent_key(&fingerprint)).await;
        }
        let _ = self.store.remove(RESUME_KEY).await;
        self.logs.push(LogKind::Info, "Session reset.", None);
        Ok(())
    }

    fn claim_job(&self, job_id: &str) -> Result<BusyGuard<'_>, AppError> {
        let mut generating = self.generating.lock().expect("busy set poisoned");
        if !generating.insert(job_id.to_string()) {
            return Err(AppError::Conflict(format!(
                "Job {job_id} already has a pipeline in flight"
            )));
        }
        Ok(BusyGuard {
            set: &self.generating,
            id: job_id.to_string(),
        })
    }

    fn mark_job(&self, job_id: &str, status: JobStatus) {
        let mut inner = self.inner.lock().expect("session poisoned");
        if let Some(job) = inner.jobs.iter_mut().find(|job| job.id == job_id) {
            job.status = status;
        }
    }

    fn mark_jobs(&self, targets: &[Job], status: JobStatus) {
        let mut inner = self.inner.lock().expect("session poisoned");
        for job in &mut inner.jobs {
            if targets.iter().any(|t| t.id == job.id) {
                job.status = status;
            }
        }
    }

    /// Best-effort persistence of the fingerprint-scoped job list.
    async fn persist_jobs(&self) {
        let (fingerprint, jobs) = {
            let inner = self.inner.lock().expect("session poisoned");
            (
                inner.resume.as_ref().map(|r| r.fingerprint.clone()),
                inner.jobs.clone(),
            )
        };
        let Some(fingerprint) = fingerprint else {
            return;
        };
        match serde_json::to_string(&jobs) {
            Ok(raw) => {
                if let Err(err) = self.store.set(&jobs_key(&fingerprint), &raw).await {
                    warn!("failed to persist jobs: {err}");
                }
            }
            Err(err) => warn!("failed to serialize jobs: {err}"),
        }
    }
}
