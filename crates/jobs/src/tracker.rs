//! Consumption adapter over [`JobManager`].
//!
//! [`GenerationTracker`] turns the job event stream into a single
//! observable [`GenerationState`] published on a
//! [`tokio::sync::watch`] channel. A consumer starts, cancels or resets a
//! generation and otherwise just watches the state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use scei_core::generation::GenerationOptions;
use scei_core::job::{JobHandle, JobKey};
use scei_core::job_result::JobResult;
use scei_core::job_status::{JobState, MAX_PROGRESS};
use scei_core::types::GenerationKind;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::events::JobEvent;
use crate::manager::JobManager;
use crate::submit::SubmitError;

/// Presentation-level status: the backend states plus `timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Queued,
    Started,
    Processing,
    Completed,
    Failed,
    Error,
    Timeout,
}

impl ProgressStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Started => "started",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Error => "error",
            Self::Timeout => "timeout",
        }
    }

    /// `true` for every status after which no further progress arrives.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Error | Self::Timeout
        )
    }
}

impl From<JobState> for ProgressStatus {
    fn from(state: JobState) -> Self {
        match state {
            JobState::Queued => Self::Queued,
            JobState::Started => Self::Started,
            JobState::Processing => Self::Processing,
            JobState::Completed => Self::Completed,
            JobState::Failed => Self::Failed,
            JobState::Error => Self::Error,
        }
    }
}

/// Latest progress as shown to the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub status: ProgressStatus,
    pub progress: u8,
    pub current_step: String,
    pub error_message: Option<String>,
}

/// Everything a consumer observes about the current generation.
///
/// `is_generating` is `true` from [`GenerationTracker::start`] until a
/// terminal event has been processed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerationState {
    pub progress: Option<ProgressSnapshot>,
    pub result: Option<JobResult>,
    pub is_generating: bool,
    /// The job being tracked, once the backend has accepted it.
    pub handle: Option<JobHandle>,
}

impl GenerationState {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Stateful front end for one generation at a time.
///
/// Only events of the job returned by the latest [`start`](Self::start)
/// reach the state; anything else on the manager's channel is ignored.
/// Dropping the tracker stops its event dispatcher and calls
/// [`JobManager::cleanup`], so no polling outlives it.
pub struct GenerationTracker {
    manager: Arc<JobManager>,
    state: Arc<watch::Sender<GenerationState>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    /// Set by a cancel that arrives while submission is in flight.
    cancel_pending: AtomicBool,
}

impl GenerationTracker {
    pub fn new(manager: Arc<JobManager>) -> Self {
        let (state, _) = watch::channel(GenerationState::default());
        Self {
            manager,
            state: Arc::new(state),
            dispatcher: Mutex::new(None),
            cancel_pending: AtomicBool::new(false),
        }
    }

    /// Subscribe to state changes.
    pub fn watch(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    /// Current state snapshot.
    pub fn state(&self) -> GenerationState {
        self.state.borrow().clone()
    }

    /// Start a new generation, replacing whatever was tracked before.
    ///
    /// A submission failure is recorded as an `error` progress snapshot
    /// with `is_generating = false` and also returned. If [`cancel`](Self::cancel)
    /// was called while the submission was in flight, the accepted job is
    /// cancelled immediately and the state stays cleared.
    pub async fn start(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        options: &GenerationOptions,
    ) -> Result<JobHandle, SubmitError> {
        self.cancel_pending.store(false, Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.clear();
            s.is_generating = true;
        });

        let events = self.manager.subscribe();
        let (tracked_tx, tracked_rx) = oneshot::channel();
        self.replace_dispatcher(Some(tokio::spawn(dispatch(
            events,
            Arc::clone(&self.state),
            tracked_rx,
        ))));

        match self.manager.start_generation(kind, subject_id, options).await {
            Ok(handle) => {
                let mut cancelled = false;
                self.state.send_modify(|s| {
                    if self.cancel_pending.swap(false, Ordering::SeqCst) {
                        cancelled = true;
                    } else {
                        s.handle = Some(handle.clone());
                    }
                });

                if cancelled {
                    tracing::info!(job_id = %handle.job_id, "Cancelling job accepted after cancel request");
                    self.manager.cancel(&handle);
                } else {
                    let _ = tracked_tx.send(handle.key());
                }
                Ok(handle)
            }
            Err(e) => {
                self.replace_dispatcher(None);
                if self.cancel_pending.swap(false, Ordering::SeqCst) {
                    return Err(e);
                }
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.is_generating = false;
                    s.progress = Some(ProgressSnapshot {
                        status: ProgressStatus::Error,
                        progress: 0,
                        current_step: "Failed to start generation".to_string(),
                        error_message: Some(message),
                    });
                });
                Err(e)
            }
        }
    }

    /// Cancel the tracked job and clear local state.
    ///
    /// Returns `true` if a registered job was cancelled, or if a submission
    /// is still in flight; that job is cancelled as soon as the backend
    /// accepts it. Returns `false` when nothing is being generated.
    pub fn cancel(&self) -> bool {
        let mut target = None;
        let mut deferred = false;
        self.state.send_if_modified(|s| {
            if let Some(handle) = s.handle.take() {
                target = Some(handle);
            } else if s.is_generating {
                self.cancel_pending.store(true, Ordering::SeqCst);
                deferred = true;
            } else {
                return false;
            }
            s.clear();
            true
        });

        if target.is_none() && !deferred {
            return false;
        }
        self.replace_dispatcher(None);

        match target {
            Some(handle) => self.manager.cancel(&handle),
            None => {
                tracing::debug!("Cancel requested before submission completed");
                true
            }
        }
    }

    /// Clear local state without touching the manager.
    pub fn reset(&self) {
        self.state.send_modify(GenerationState::clear);
    }

    fn replace_dispatcher(&self, next: Option<JoinHandle<()>>) {
        let mut slot = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = std::mem::replace(&mut *slot, next) {
            previous.abort();
        }
    }
}

impl Drop for GenerationTracker {
    fn drop(&mut self) {
        self.replace_dispatcher(None);
        self.manager.cleanup();
    }
}

/// Apply the tracked job's events to the shared state until the listener
/// is replaced.
///
/// The job key only becomes known once submission returns; events that
/// arrive earlier are held back and filtered once it does. If the sender
/// is dropped (submission failed) the dispatcher exits.
async fn dispatch(
    mut events: mpsc::UnboundedReceiver<JobEvent>,
    state: Arc<watch::Sender<GenerationState>>,
    mut tracked: oneshot::Receiver<JobKey>,
) {
    let mut early = Vec::new();
    let key = loop {
        tokio::select! {
            key = &mut tracked => match key {
                Ok(key) => break key,
                Err(_) => return,
            },
            event = events.recv() => match event {
                Some(event) => early.push(event),
                None => return,
            },
        }
    };

    let apply = |event: JobEvent| {
        if event.handle().key() != key {
            tracing::trace!(job_id = %event.handle().job_id, "Ignoring event for untracked job");
            return;
        }
        state.send_modify(|s| apply_event(s, event));
    };

    for event in early {
        apply(event);
    }
    while let Some(event) = events.recv().await {
        apply(event);
    }
}

/// Fold one job event into the consumer state.
pub fn apply_event(state: &mut GenerationState, event: JobEvent) {
    match event {
        JobEvent::Progress { status, .. } => {
            state.progress = Some(ProgressSnapshot {
                status: status.status.into(),
                progress: status.progress,
                current_step: status.current_step,
                error_message: status.error_message,
            });
        }
        JobEvent::Completed { result, .. } => {
            state.result = Some(result);
            state.progress = Some(ProgressSnapshot {
                status: ProgressStatus::Completed,
                progress: MAX_PROGRESS,
                current_step: "Generation complete".to_string(),
                error_message: None,
            });
            state.is_generating = false;
        }
        JobEvent::Failed { message, .. } => {
            terminate(state, ProgressStatus::Failed, message, "Generation failed");
        }
        JobEvent::Timeout { message, .. } => {
            terminate(state, ProgressStatus::Timeout, message, "Generation timed out");
        }
        JobEvent::Error { message, .. } => {
            terminate(state, ProgressStatus::Error, message, "Generation status check failed");
        }
        JobEvent::Cancelled { .. } => {}
    }
}

/// Record a non-success terminal outcome. The message shown is never
/// empty.
fn terminate(state: &mut GenerationState, status: ProgressStatus, message: String, fallback: &str) {
    let message = if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    };
    let progress = state.progress.as_ref().map_or(0, |p| p.progress);

    state.progress = Some(ProgressSnapshot {
        status,
        progress,
        current_step: fallback.to_string(),
        error_message: Some(message),
    });
    state.is_generating = false;
}
