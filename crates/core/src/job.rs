//! Identity of a single in-flight generation job.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::types::{GenerationKind, Timestamp};

/// Everything the client knows about a submitted job.
///
/// Created when the backend accepts a submission. Lives only in process
/// memory; the backend remains the source of truth for job existence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    /// Opaque identifier assigned by the backend.
    pub job_id: String,
    pub kind: GenerationKind,
    /// The entity (unit) the artifact is generated for.
    pub subject_id: String,
    /// Informational estimate from the backend, e.g. `"10-25 minutes"`.
    pub estimated_duration: Option<String>,
    /// When polling began.
    pub started_at: Timestamp,
}

/// Registry key for an active job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub kind: GenerationKind,
    pub subject_id: String,
    pub job_id: String,
}

impl JobHandle {
    /// Build a handle stamped with the current time.
    pub fn new(
        job_id: impl Into<String>,
        kind: GenerationKind,
        subject_id: impl Into<String>,
        estimated_duration: Option<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            subject_id: subject_id.into(),
            estimated_duration,
            started_at: Utc::now(),
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.kind, &self.subject_id, &self.job_id)
    }
}

impl JobKey {
    pub fn new(kind: GenerationKind, subject_id: &str, job_id: &str) -> Self {
        Self {
            kind,
            subject_id: subject_id.to_string(),
            job_id: job_id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_independent_of_metadata() {
        let a = JobHandle::new("J1", GenerationKind::StudyGuide, "U1", None);
        let b = JobHandle::new(
            "J1",
            GenerationKind::StudyGuide,
            "U1",
            Some("10-25 minutes".into()),
        );
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn same_job_id_different_kind_is_a_different_key() {
        let a = JobHandle::new("J1", GenerationKind::StudyGuide, "U1", None);
        let b = JobHandle::new("J1", GenerationKind::Presentation, "U1", None);
        assert_ne!(a.key(), b.key());
    }
}
