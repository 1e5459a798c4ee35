//! Normalized generation results.
//!
//! The content endpoints of the two kinds disagree on field names
//! (`latex_content` vs `beamer_content`, `estimated_pages` vs
//! `slide_count`, ...). [`JobResult::from_content`] folds both shapes into
//! one record.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;
use crate::types::{GenerationKind, Timestamp};

/// Rough number of LaTeX source characters per rendered page, used when
/// the backend does not report a page count.
pub const CHARS_PER_PAGE_ESTIMATE: usize = 3000;

/// Beamer frame opener counted when the backend does not report a slide
/// count.
const FRAME_MARKER: &str = "\\begin{frame}";

/// The generated artifact for one completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub kind: GenerationKind,
    pub subject_id: String,
    pub job_id: String,
    /// LaTeX source (study guide) or Beamer source (presentation).
    pub content: String,
    pub generation_method: Option<String>,
    pub generated_at: Option<Timestamp>,
    /// Validation annotations attached by the backend.
    pub validation_issues: Vec<String>,
    /// Page count (study guide) or slide count (presentation).
    pub size_estimate: Option<u32>,
    /// The unmodified content endpoint body.
    pub raw: Value,
}

impl JobResult {
    /// Normalize a content endpoint body into a [`JobResult`].
    ///
    /// Fails only when no content field is present.
    pub fn from_content(
        kind: GenerationKind,
        subject_id: &str,
        job_id: &str,
        body: Value,
    ) -> Result<Self, CoreError> {
        let content_fields: &[&str] = match kind {
            GenerationKind::StudyGuide => &["latex_content", "beamer_content", "content"],
            GenerationKind::Presentation => &["beamer_content", "latex_content", "content"],
        };

        let content = first_str(&body, content_fields)
            .ok_or_else(|| {
                CoreError::Malformed(format!(
                    "Content response for {kind} job {job_id} has no content field"
                ))
            })?
            .to_string();

        let generation_method = first_str(&body, &["generation_method", "method"]).map(str::to_string);

        let generated_at = first_str(&body, &["generated_at"])
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc));

        let validation_issues = body
            .get("validation_issues")
            .or_else(|| body.get("validation").and_then(|v| v.get("issues")))
            .and_then(|v| v.as_array())
            .map(|issues| {
                issues
                    .iter()
                    .filter_map(|i| i.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let size_fields: &[&str] = match kind {
            GenerationKind::StudyGuide => &["estimated_pages", "page_count"],
            GenerationKind::Presentation => &["slide_count", "estimated_slides"],
        };
        let size_estimate = first_u32(&body, size_fields).or_else(|| estimate_size(kind, &content));

        Ok(Self {
            kind,
            subject_id: subject_id.to_string(),
            job_id: job_id.to_string(),
            content,
            generation_method,
            generated_at,
            validation_issues,
            size_estimate,
            raw: body,
        })
    }
}

/// Derive a page or slide count from the generated source.
///
/// Returns `None` when nothing sensible can be derived (empty content, or
/// a deck without frames).
pub fn estimate_size(kind: GenerationKind, content: &str) -> Option<u32> {
    if content.trim().is_empty() {
        return None;
    }
    match kind {
        GenerationKind::StudyGuide => {
            let pages = content.chars().count().div_ceil(CHARS_PER_PAGE_ESTIMATE);
            Some(pages.max(1) as u32)
        }
        GenerationKind::Presentation => {
            let frames = content.matches(FRAME_MARKER).count();
            (frames > 0).then_some(frames as u32)
        }
    }
}

fn first_str<'a>(body: &'a Value, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|f| body.get(*f).and_then(|v| v.as_str()))
}

fn first_u32(body: &Value, fields: &[&str]) -> Option<u32> {
    fields
        .iter()
        .find_map(|f| body.get(*f).and_then(|v| v.as_u64()))
        .and_then(|n| u32::try_from(n).ok())
}
