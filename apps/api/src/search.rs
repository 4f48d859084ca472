//! Semantic search collaborator — an opaque "rank jobs by relevance" seam.
//!
//! The orchestration core treats the searcher as a black box. The shipped
//! implementation is the mandated fallback: sort by match score descending
//! and take the top K. An embedding-backed searcher can be swapped in via
//! `AppState` without touching any caller.

use async_trait::async_trait;

use crate::models::job::Job;

#[async_trait]
pub trait JobSearcher: Send + Sync {
    /// Returns a relevance-ranked subset of `corpus` for `query`.
    async fn search(&self, query: &str, corpus: &[Job], top_k: usize) -> Vec<Job>;
}

/// Fallback searcher: best-scored jobs first, unscored last.
pub struct ScoreRankSearcher;

#[async_trait]
impl JobSearcher for ScoreRankSearcher {
    async fn search(&self, _query: &str, corpus: &[Job], top_k: usize) -> Vec<Job> {
        let mut ranked: Vec<Job> = corpus.to_vec();
        ranked.sort_by(|a, b| {
            b.match_score
                .unwrap_or(0)
                .cmp(&a.match_score.unwrap_or(0))
        });
        ranked.truncate(top_k);
        ranked
    }
}
