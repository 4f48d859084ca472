//! Artifact Cache — content-addressed memoization of evaluation/generation
//! results, keyed by (résumé fingerprint, job id).
//!
//! The cache sits on the key/value collaborator and is the source of truth
//! for everything a job row displays; hydration overlays cached fields onto
//! imported jobs so analyzed work survives reloads without re-spending calls.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::warn;

use crate::models::artifact::{Artifact, ArtifactPatch};
use crate::models::job::{Job, JobStatus};
use crate::stores::KvStore;

const ARTIFACT_KEY_PREFIX: &str = "safesubmit_artifact_";
const INDEX_KEY_PREFIX: &str = "safesubmit_artifact_index_";

pub struct ArtifactCache {
    store: Arc<dyn KvStore>,
}

impl ArtifactCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    fn storage_key(fingerprint: &str, job_id: &str) -> String {
        format!("{ARTIFACT_KEY_PREFIX}{fingerprint}_{job_id}")
    }

    fn index_key(fingerprint: &str) -> String {
        format!("{INDEX_KEY_PREFIX}{fingerprint}")
    }

    pub async fn get(&self, fingerprint: &str, job_id: &str) -> Result<Option<Artifact>> {
        let key = Self::storage_key(fingerprint, job_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(err) => {
                warn!("discarding unreadable artifact at {key}: {err}");
                Ok(None)
            }
        }
    }

    /// Merge-writes a patch for the key. Only the patch's provided fields
    /// overwrite; the stored artifact keeps everything else, so concurrent
    /// evaluation and generation writers never clobber each other.
    pub async fn put(
        &self,
        fingerprint: &str,
        job_id: &str,
        patch: ArtifactPatch,
    ) -> Result<Artifact> {
        let mut artifact = self.get(fingerprint, job_id).await?.unwrap_or_default();
        artifact.merge(patch, Utc::now());

        let key = Self::storage_key(fingerprint, job_id);
        self.store
            .set(&key, &serde_json::to_string(&artifact)?)
            .await?;
        self.track(fingerprint, job_id).await?;
        Ok(artifact)
    }

    /// Records the job id in the fingerprint's index so `clear` can
    /// enumerate artifacts over a scan-less key/value store.
    async fn track(&self, fingerprint: &str, job_id: &str) -> Result<()> {
        let key = Self::index_key(fingerprint);
        let mut ids: Vec<String> = match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };
        if !ids.iter().any(|id| id == job_id) {
            ids.push(job_id.to_string());
            self.store.set(&key, &serde_json::to_string(&ids)?).await?;
        }
        Ok(())
    }

    /// Deletes every artifact scoped to the fingerprint. Used on explicit
    /// session reset; résumé replacement merely orphans the old scope.
    pub async fn clear(&self, fingerprint: &str) -> Result<usize> {
        let index_key = Self::index_key(fingerprint);
        let ids: Vec<String> = match self.store.get(&index_key).await? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            None => Vec::new(),
        };
        for job_id in &ids {
            self.store
                .remove(&Self::storage_key(fingerprint, job_id))
                .await?;
        }
        self.store.remove(&index_key).await?;
        Ok(ids.len())
    }

    /// Overlays the cached artifact (if any) onto a job.
    pub async fn hydrate(&self, mut job: Job, fingerprint: &str) -> Result<Job> {
        if let Some(artifact) = self.get(fingerprint, &job.id).await? {
            overlay(&mut job, &artifact);
        }
        Ok(job)
    }
}

/// Pure overlay of cached fields onto a job row.
///
/// An evaluated-but-not-generated job restores to NEW, not PROCESSING —
/// the presence of `match_score` already tells readers it was analyzed,
/// and nothing is actually in flight after a reload.
pub fn overlay(job: &mut Job, artifact: &Artifact) {
    if artifact.match_score.is_some() {
        job.match_score = artifact.match_score;
    }
    if artifact.visa_risk.is_some() {
        job.visa_risk = artifact.visa_risk;
    }
    if let Some(reasoning) = &artifact.reasoning {
        job.reasoning = Some(reasoning.clone());
    }
    if let Some(evaluated_by) = &artifact.evaluated_by {
        job.evaluated_by = Some(evaluated_by.clone());
    }
    if let Some(resume) = &artifact.generated_resume {
        job.generated_resume = Some(resume.clone());
    }
    job.status = if artifact.generated_resume.is_some() {
        JobStatus::Done
    } else {
        JobStatus::New
    };
}
