//! Job submission client.
//!
//! Issues exactly one "start generation" request and accepts only an
//! explicit `202 Accepted` carrying a job id. There is no retry at this
//! layer.

use scei_core::error::CoreError;
use scei_core::generation::{validate_subject_id, GenerationOptions};
use scei_core::types::GenerationKind;
use serde_json::Value;

use crate::api::{ApiError, GenerationBackend};

/// The only status code that signals an accepted submission.
pub const STATUS_ACCEPTED: u16 = 202;

/// What the backend told us about a newly accepted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_id: String,
    pub estimated_duration: Option<String>,
}

/// Errors that prevent a job from being submitted.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The request failed local validation and was never sent.
    #[error("Invalid generation request: {0}")]
    InvalidRequest(#[from] CoreError),

    /// The request could not be delivered or the response not decoded.
    #[error("Submission request failed: {0}")]
    Transport(ApiError),

    /// The backend answered with a non-2xx status.
    #[error("Submission rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A 2xx status other than 202 Accepted.
    #[error("Unexpected submission response status {0}, expected 202 Accepted")]
    UnexpectedStatus(u16),

    /// 202 Accepted without a usable `job_id`.
    #[error("Submission response did not include a job id")]
    MissingJobId,
}

impl SubmitError {
    /// Upstream HTTP status, when the backend answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::UnexpectedStatus(status) => Some(*status),
            Self::MissingJobId => Some(STATUS_ACCEPTED),
            Self::InvalidRequest(_) | Self::Transport(_) => None,
        }
    }
}

impl From<ApiError> for SubmitError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Api { status, body } => Self::Rejected {
                status,
                message: error_message(status, &body),
            },
            other => Self::Transport(other),
        }
    }
}

/// Submit a generation job for `subject_id`.
///
/// Resolves kind-specific option defaults, sends one request, and
/// validates the accepted response. A job id is never synthesized.
pub async fn submit(
    backend: &dyn GenerationBackend,
    kind: GenerationKind,
    subject_id: &str,
    options: &GenerationOptions,
) -> Result<Submission, SubmitError> {
    validate_subject_id(subject_id)?;
    let request = options.resolve(kind);

    tracing::debug!(
        %kind,
        subject_id,
        generation_method = %request.generation_method,
        timezone = %request.timezone,
        "Submitting generation job",
    );

    let response = backend.submit(kind, subject_id, &request).await?;

    if response.status != STATUS_ACCEPTED {
        return Err(SubmitError::UnexpectedStatus(response.status));
    }

    let job_id = response
        .body
        .get("job_id")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .ok_or(SubmitError::MissingJobId)?
        .to_string();

    let estimated_duration = response
        .body
        .get("estimated_duration")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(Submission {
        job_id,
        estimated_duration,
    })
}

/// Pull a human-readable message out of an error body.
///
/// Looks for `detail`, `message` or `error` string fields in a JSON body,
/// then falls back to the raw text, then to the bare status code.
fn error_message(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        ["detail", "message", "error"]
            .iter()
            .find_map(|f| json.get(*f).and_then(Value::as_str).map(str::to_string))
    });

    from_json
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}
