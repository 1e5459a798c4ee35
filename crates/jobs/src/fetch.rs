//! Result fetcher.
//!
//! Retrieves the artifact of a completed job from the content endpoint
//! (a separate resource from job status) and normalizes it into a
//! [`JobResult`]. Callers must only invoke it after observing a
//! `completed` status.

use scei_core::error::CoreError;
use scei_core::job::JobHandle;
use scei_core::job_result::JobResult;

use crate::api::{ApiError, GenerationBackend};

/// The job succeeded but its result could not be retrieved.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Failed to retrieve generated content: {0}")]
    Transport(#[from] ApiError),

    #[error("Generated content is malformed: {0}")]
    Malformed(#[from] CoreError),
}

/// Fetch and normalize the artifact for `handle`.
pub async fn fetch_result(
    backend: &dyn GenerationBackend,
    handle: &JobHandle,
) -> Result<JobResult, FetchError> {
    let body = backend
        .content(handle.kind, &handle.subject_id, &handle.job_id)
        .await?;

    let result = JobResult::from_content(handle.kind, &handle.subject_id, &handle.job_id, body)?;

    if result.generated_at.is_none() && result.raw.get("generated_at").is_some() {
        tracing::warn!(
            job_id = %handle.job_id,
            raw = %result.raw["generated_at"],
            "Ignoring unparseable generated_at timestamp",
        );
    }

    tracing::debug!(
        job_id = %handle.job_id,
        kind = %handle.kind,
        content_len = result.content.len(),
        size_estimate = ?result.size_estimate,
        issues = result.validation_issues.len(),
        "Fetched generation result",
    );

    Ok(result)
}
