//! Job status snapshots returned by the backend status endpoint.
//!
//! The backend reports one of six states. `completed`, `failed` and
//! `error` are terminal; everything else means "poll again".

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound of the progress scale.
pub const MAX_PROGRESS: u8 = 100;

/// Canonical server-side job states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Started,
    Processing,
    Completed,
    Failed,
    Error,
}

impl JobState {
    /// `true` once the backend will not change the job's state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

/// One status observation for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    /// Completion percentage (0-100).
    pub progress: u8,
    /// Human-readable description of the current step.
    pub current_step: String,
    /// Present only when `status` is `failed` or `error`.
    pub error_message: Option<String>,
}

impl JobStatus {
    /// Parse a status endpoint body.
    ///
    /// `status` is required and must be a known state. `progress` defaults
    /// to 0 and is clamped into 0..=100; `current_step` defaults to empty.
    pub fn from_body(body: &serde_json::Value) -> Result<Self, CoreError> {
        let raw_status = body.get("status").ok_or_else(|| {
            CoreError::Malformed("Status response is missing the 'status' field".to_string())
        })?;

        let status = JobState::deserialize(raw_status)
            .map_err(|_| CoreError::Malformed(format!("Unknown job status {raw_status}")))?;

        let progress = body
            .get("progress")
            .and_then(|v| v.as_f64())
            .map(clamp_progress)
            .unwrap_or(0);

        let current_step = body
            .get("current_step")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        let error_message = body
            .get("error_message")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(Self {
            status,
            progress,
            current_step,
            error_message,
        })
    }
}

fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() || raw <= 0.0 {
        0
    } else if raw >= MAX_PROGRESS as f64 {
        MAX_PROGRESS
    } else {
        raw as u8
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn terminal_states() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Error.is_terminal());
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Started.is_terminal());
        assert!(!JobState::Processing.is_terminal());
    }

    #[test]
    fn parses_full_body() {
        let status = JobStatus::from_body(&json!({
            "status": "failed",
            "progress": 40,
            "current_step": "Rendering chapter 3",
            "error_message": "LaTeX compilation failed",
        }))
        .unwrap();

        assert_eq!(status.status, JobState::Failed);
        assert_eq!(status.progress, 40);
        assert_eq!(status.current_step, "Rendering chapter 3");
        assert_eq!(status.error_message.as_deref(), Some("LaTeX compilation failed"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let status = JobStatus::from_body(&json!({"status": "queued"})).unwrap();
        assert_eq!(status.progress, 0);
        assert!(status.current_step.is_empty());
        assert!(status.error_message.is_none());
    }

    #[test]
    fn missing_status_is_an_error() {
        assert!(JobStatus::from_body(&json!({"progress": 10})).is_err());
    }

    #[test]
    fn unknown_status_is_an_error() {
        assert!(JobStatus::from_body(&json!({"status": "paused"})).is_err());
        assert!(JobStatus::from_body(&json!({"status": 3})).is_err());
        assert!(JobStatus::from_body(&json!({"status": "Completed"})).is_err());
    }

    #[test]
    fn every_state_parses_from_its_wire_name() {
        for state in [
            JobState::Queued,
            JobState::Started,
            JobState::Processing,
            JobState::Completed,
            JobState::Failed,
            JobState::Error,
        ] {
            let parsed = JobStatus::from_body(&json!({"status": state.as_str()})).unwrap();
            assert_eq!(parsed.status, state);
        }
    }

    #[test]
    fn progress_is_clamped() {
        let over = JobStatus::from_body(&json!({"status": "processing", "progress": 250})).unwrap();
        let under = JobStatus::from_body(&json!({"status": "processing", "progress": -5})).unwrap();
        let frac = JobStatus::from_body(&json!({"status": "processing", "progress": 42.7})).unwrap();

        assert_eq!(over.progress, 100);
        assert_eq!(under.progress, 0);
        assert_eq!(frac.progress, 42);
    }
}
