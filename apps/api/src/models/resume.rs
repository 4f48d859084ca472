use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded résumé. Replaced wholesale on re-upload, never mutated.
///
/// `fingerprint` is the SHA-256 hex of `text` and partitions everything
/// downstream: artifacts, persisted job lists, and the stored intent are all
/// scoped to it. A new upload with different text gets a new fingerprint and
/// the old scope's artifacts become orphaned (not deleted).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeProfile {
    pub file_name: String,
    pub text: String,
    pub uploaded_at: DateTime<Utc>,
    pub fingerprint: String,
}
