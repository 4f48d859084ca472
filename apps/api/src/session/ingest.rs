//! Résumé ingestion: text extraction and fingerprinting.

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::errors::AppError;
use crate::models::resume::ResumeProfile;

/// Stable SHA-256 hex fingerprint of résumé text. This is the cache and
/// session partition key — identical text always maps to the same scope.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extracts plain text from an uploaded résumé file.
/// PDFs go through pdf-extract; everything else must be UTF-8 text.
pub fn extract_resume_text(file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
    if file_name.to_lowercase().ends_with(".pdf") {
        return pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| AppError::Validation(format!("Could not extract PDF text: {err}")));
    }
    String::from_utf8(bytes.to_vec())
        .map_err(|_| AppError::Validation("Resume file must be UTF-8 text".to_string()))
}

/// Builds a profile from an uploaded file.
pub fn build_profile(file_name: &str, bytes: &[u8]) -> Result<ResumeProfile, AppError> {
    let text = extract_resume_text(file_name, bytes)?;
    if text.trim().is_empty() {
        return Err(AppError::Validation("Resume file is empty".to_string()));
    }
    Ok(ResumeProfile {
        file_name: file_name.to_string(),
        fingerprint: fingerprint(&text),
        text,
        uploaded_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_content_addressed() {
        let a = fingerprint("Senior Engineer, 5 yrs Python");
        let b = fingerprint("Senior Engineer, 5 yrs Python");
        let c = fingerprint("Junior Engineer");
        assert_eq!(a, b);
        assert_ne!(a, c);
        // SHA-256 hex
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_plain_text_upload_round_trips() {
        let profile = build_profile("resume.md", "## Experience\n- Things".as_bytes()).unwrap();
        assert_eq!(profile.file_name, "resume.md");
        assert!(profile.text.contains("Experience"));
        assert_eq!(profile.fingerprint, fingerprint(&profile.text));
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        assert!(build_profile("resume.txt", b"   \n").is_err());
    }

    #[test]
    fn test_non_utf8_upload_is_rejected() {
        assert!(build_profile("resume.txt", &[0xff, 0xfe, 0x00]).is_err());
    }
}
