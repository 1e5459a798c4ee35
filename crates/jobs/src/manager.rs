//! Generation job manager.
//!
//! [`JobManager`] owns the registry of active jobs and the job event
//! channel. [`JobManager::start_generation`] submits a job, registers it
//! with its own cancellation token, and spawns a polling task for it
//! before returning.
//!
//! Registry membership is the authority on whether a job is still live:
//! a polling task only emits while its registration is present, and
//! removes it in the same critical section as its terminal event.
//! Cancelling a job removes the registration and cancels the token, so
//! a response that arrives afterwards is discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use scei_core::generation::GenerationOptions;
use scei_core::job::{JobHandle, JobKey};
use scei_core::types::GenerationKind;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::api::GenerationBackend;
use crate::events::{EventChannel, JobEvent};
use crate::poller::PollTask;
use crate::schedule::PollConfig;
use crate::submit::{self, SubmitError};

/// How long [`JobManager::shutdown`] waits for each polling task.
const SHUTDOWN_TASK_TIMEOUT: Duration = Duration::from_secs(5);

/// Orchestrates submission, polling and event delivery for generation
/// jobs.
///
/// Share it as `Arc<JobManager>`. Dropping the manager cancels every
/// polling task it started.
pub struct JobManager {
    backend: Arc<dyn GenerationBackend>,
    config: PollConfig,
    registry: Arc<Registry>,
    /// Master cancellation token; every job token is a child of it.
    shutdown: CancellationToken,
    next_serial: AtomicU64,
}

/// Active jobs plus the event listener, behind one lock so that
/// "still registered?" and "emit" happen atomically.
#[derive(Default)]
pub(crate) struct Registry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    jobs: HashMap<JobKey, ActiveJob>,
    events: EventChannel,
}

/// Internal bookkeeping for a single registered job.
struct ActiveJob {
    handle: JobHandle,
    cancel: CancellationToken,
    /// Distinguishes re-registrations of the same key.
    serial: u64,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl JobManager {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: PollConfig) -> Self {
        Self {
            backend,
            config,
            registry: Arc::new(Registry::default()),
            shutdown: CancellationToken::new(),
            next_serial: AtomicU64::new(0),
        }
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.config
    }

    /// Install the job event listener, replacing any previous one.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<JobEvent> {
        self.registry.lock().events.subscribe()
    }

    /// Remove the job event listener. Events are dropped until the next
    /// [`subscribe`](Self::subscribe).
    pub fn clear_listeners(&self) {
        self.registry.lock().events.clear();
    }

    /// Submit a generation job and start polling it.
    ///
    /// On success the job is registered and its polling task is already
    /// running. Submission failures are returned directly; the job never
    /// enters the registry.
    pub async fn start_generation(
        &self,
        kind: GenerationKind,
        subject_id: &str,
        options: &GenerationOptions,
    ) -> Result<JobHandle, SubmitError> {
        let submission = submit::submit(self.backend.as_ref(), kind, subject_id, options)
            .await
            .inspect_err(|e| {
                tracing::warn!(%kind, subject_id, error = %e, "Generation submission failed");
            })?;

        let handle = JobHandle::new(
            submission.job_id,
            kind,
            subject_id,
            submission.estimated_duration,
        );

        tracing::info!(
            job_id = %handle.job_id,
            %kind,
            subject_id,
            estimated_duration = ?handle.estimated_duration,
            "Generation job accepted",
        );

        self.register_and_poll(handle.clone());
        Ok(handle)
    }

    /// Cancel a job by its identifying triple.
    ///
    /// Returns `true` if the job was registered. Cancelling a job that
    /// already finished is a no-op.
    pub fn cancel_job(&self, kind: GenerationKind, subject_id: &str, job_id: &str) -> bool {
        let key = JobKey::new(kind, subject_id, job_id);
        let mut registry = self.registry.lock();

        match registry.jobs.remove(&key) {
            Some(job) => {
                job.cancel.cancel();
                tracing::info!(job_id, %kind, subject_id, "Generation job cancelled");
                registry
                    .events
                    .emit(JobEvent::Cancelled { handle: job.handle });
                true
            }
            None => {
                tracing::debug!(job_id, %kind, subject_id, "Cancel ignored, job not active");
                false
            }
        }
    }

    /// Cancel the job identified by `handle`.
    pub fn cancel(&self, handle: &JobHandle) -> bool {
        self.cancel_job(handle.kind, &handle.subject_id, &handle.job_id)
    }

    /// Snapshot of every registered job.
    pub fn active_jobs(&self) -> Vec<JobHandle> {
        self.registry
            .lock()
            .jobs
            .values()
            .map(|job| job.handle.clone())
            .collect()
    }

    /// Cancel and deregister every job and drop the event listener.
    ///
    /// No further events are emitted for the removed jobs. The manager
    /// remains usable.
    pub fn cleanup(&self) {
        let mut registry = self.registry.lock();
        let count = registry.jobs.len();
        for (_, job) in registry.jobs.drain() {
            job.cancel.cancel();
        }
        registry.events.clear();
        if count > 0 {
            tracing::info!(count, "Cleaned up active generation jobs");
        }
    }

    /// Like [`cleanup`](Self::cleanup), then wait up to 5 seconds per
    /// polling task for a clean exit.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = {
            let mut registry = self.registry.lock();
            registry.events.clear();
            registry
                .jobs
                .drain()
                .filter_map(|(_, job)| {
                    job.cancel.cancel();
                    job.task
                })
                .collect()
        };

        tracing::info!(count = tasks.len(), "Shutting down job manager");
        for task in tasks {
            let _ = tokio::time::timeout(SHUTDOWN_TASK_TIMEOUT, task).await;
        }
    }

    // ---- private helpers ----

    fn register_and_poll(&self, handle: JobHandle) {
        let key = handle.key();
        let cancel = self.shutdown.child_token();
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);

        {
            let mut registry = self.registry.lock();
            let previous = registry.jobs.insert(
                key.clone(),
                ActiveJob {
                    handle: handle.clone(),
                    cancel: cancel.clone(),
                    serial,
                    task: None,
                },
            );
            if let Some(previous) = previous {
                tracing::warn!(job_id = %key.job_id, "Job re-registered, stopping previous poller");
                previous.cancel.cancel();
            }
        }

        let task = PollTask {
            backend: Arc::clone(&self.backend),
            registry: Arc::clone(&self.registry),
            config: self.config.clone(),
            handle,
            key: key.clone(),
            serial,
            cancel,
        };
        let join = tokio::spawn(task.run());

        let mut registry = self.registry.lock();
        if let Some(job) = registry.jobs.get_mut(&key).filter(|j| j.serial == serial) {
            job.task = Some(join);
        }
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emit a non-terminal event if the registration is still live.
    ///
    /// Returns `false` when the job has been deregistered, in which case
    /// the caller must stop.
    pub(crate) fn emit_if_active(&self, key: &JobKey, serial: u64, event: JobEvent) -> bool {
        let registry = self.lock();
        if !registry.is_live(key, serial) {
            return false;
        }
        registry.events.emit(event);
        true
    }

    /// Deregister the job and emit its terminal event, atomically.
    ///
    /// Does nothing (and returns `false`) if the job was already removed.
    pub(crate) fn finish(&self, key: &JobKey, serial: u64, event: JobEvent) -> bool {
        let mut registry = self.lock();
        if !registry.is_live(key, serial) {
            return false;
        }
        registry.jobs.remove(key);
        registry.events.emit(event);
        true
    }
}

impl RegistryInner {
    fn is_live(&self, key: &JobKey, serial: u64) -> bool {
        self.jobs
            .get(key)
            .is_some_and(|job| job.serial == serial && !job.cancel.is_cancelled())
    }
}
