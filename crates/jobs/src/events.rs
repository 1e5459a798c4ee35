//! Typed job lifecycle events and the single-consumer channel that
//! carries them.
//!
//! For any one job the sequence is zero or more [`JobEvent::Progress`]
//! followed by exactly one terminal event (`Completed`, `Failed`,
//! `Timeout` or `Error`), or by `Cancelled` when the client cancels it.

use scei_core::job::JobHandle;
use scei_core::job_events::{
    EVENT_JOB_CANCELLED, EVENT_JOB_COMPLETED, EVENT_JOB_ERROR, EVENT_JOB_FAILED,
    EVENT_JOB_PROGRESS, EVENT_JOB_TIMEOUT,
};
use scei_core::job_result::JobResult;
use scei_core::job_status::JobStatus;
use serde::Serialize;
use tokio::sync::mpsc;

/// Why a job ended in [`JobEvent::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The backend reported `failed` or `error`.
    Generation,
    /// The backend reported `completed` but the content could not be
    /// retrieved or understood.
    ResultUnavailable,
}

/// A lifecycle notification for one job.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// A non-terminal status observation.
    #[serde(rename = "job_progress")]
    Progress { handle: JobHandle, status: JobStatus },

    /// The job finished and its result was fetched.
    #[serde(rename = "job_completed")]
    Completed { handle: JobHandle, result: JobResult },

    /// The job failed, either server-side or while fetching its result.
    #[serde(rename = "job_failed")]
    Failed {
        handle: JobHandle,
        reason: FailureReason,
        message: String,
    },

    /// No terminal status arrived before the polling deadline.
    #[serde(rename = "job_timeout")]
    Timeout { handle: JobHandle, message: String },

    /// A status check failed.
    #[serde(rename = "job_error")]
    Error { handle: JobHandle, message: String },

    /// The client cancelled the job.
    #[serde(rename = "job_cancelled")]
    Cancelled { handle: JobHandle },
}

impl JobEvent {
    pub fn handle(&self) -> &JobHandle {
        match self {
            Self::Progress { handle, .. }
            | Self::Completed { handle, .. }
            | Self::Failed { handle, .. }
            | Self::Timeout { handle, .. }
            | Self::Error { handle, .. }
            | Self::Cancelled { handle } => handle,
        }
    }

    /// Event name, identical to the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress { .. } => EVENT_JOB_PROGRESS,
            Self::Completed { .. } => EVENT_JOB_COMPLETED,
            Self::Failed { .. } => EVENT_JOB_FAILED,
            Self::Timeout { .. } => EVENT_JOB_TIMEOUT,
            Self::Error { .. } => EVENT_JOB_ERROR,
            Self::Cancelled { .. } => EVENT_JOB_CANCELLED,
        }
    }

    /// `true` for the four outcomes that end polling on their own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed { .. } | Self::Failed { .. } | Self::Timeout { .. } | Self::Error { .. }
        )
    }
}

/// Single-consumer event channel.
///
/// At most one listener exists at a time: [`subscribe`](Self::subscribe)
/// replaces the current sender, which closes the previous receiver.
/// Not synchronized on its own; the owner guards it.
#[derive(Debug, Default)]
pub struct EventChannel {
    sender: Option<mpsc::UnboundedSender<JobEvent>>,
}

impl EventChannel {
    /// Install a fresh listener and return its receiving end.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<JobEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.sender.replace(tx).is_some() {
            tracing::debug!("Replaced previous job event listener");
        }
        rx
    }

    /// Drop the current listener, if any.
    pub fn clear(&mut self) {
        self.sender = None;
    }

    /// Deliver `event` to the listener. Returns `false` if nobody is
    /// listening; the event is then dropped.
    pub fn emit(&self, event: JobEvent) -> bool {
        match &self.sender {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use scei_core::types::GenerationKind;

    use super::*;

    fn handle() -> JobHandle {
        JobHandle::new("J1", GenerationKind::StudyGuide, "U1", None)
    }

    #[test]
    fn serialized_type_matches_name() {
        let events = [
            JobEvent::Timeout {
                handle: handle(),
                message: "timed out".into(),
            },
            JobEvent::Error {
                handle: handle(),
                message: "boom".into(),
            },
            JobEvent::Failed {
                handle: handle(),
                reason: FailureReason::Generation,
                message: "bad".into(),
            },
            JobEvent::Cancelled { handle: handle() },
        ];

        for event in events {
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["type"], event.name());
            assert_eq!(json["handle"]["job_id"], "J1");
        }
    }

    #[test]
    fn cancelled_is_not_terminal() {
        assert!(!JobEvent::Cancelled { handle: handle() }.is_terminal());
        assert!(JobEvent::Error {
            handle: handle(),
            message: String::new(),
        }
        .is_terminal());
    }

    #[test]
    fn emit_without_listener_is_dropped() {
        let channel = EventChannel::default();
        assert!(!channel.emit(JobEvent::Cancelled { handle: handle() }));
    }

    #[tokio::test]
    async fn resubscribing_closes_previous_listener() {
        let mut channel = EventChannel::default();
        let mut first = channel.subscribe();
        let mut second = channel.subscribe();

        assert!(channel.emit(JobEvent::Cancelled { handle: handle() }));

        assert!(first.recv().await.is_none(), "old listener should be closed");
        let event = second.recv().await.expect("new listener should receive");
        assert_eq!(event.name(), EVENT_JOB_CANCELLED);
    }

    #[tokio::test]
    async fn clear_closes_listener() {
        let mut channel = EventChannel::default();
        let mut rx = channel.subscribe();
        channel.clear();

        assert!(rx.recv().await.is_none());
    }
}
