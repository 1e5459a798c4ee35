//! Per-job status polling task.
//!
//! One [`PollTask`] runs per registered job: poll status, publish
//! progress, sleep for the adaptive interval, repeat until a terminal
//! status, the timeout, or cancellation. Sleeps and in-flight requests
//! both race against the job's cancellation token, which always wins a
//! tie.

use std::sync::Arc;

use scei_core::job::{JobHandle, JobKey};
use scei_core::job_status::{JobState, JobStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::api::GenerationBackend;
use crate::events::{FailureReason, JobEvent};
use crate::fetch::fetch_result;
use crate::manager::Registry;
use crate::schedule::{PollConfig, PollSchedule};

pub(crate) struct PollTask {
    pub(crate) backend: Arc<dyn GenerationBackend>,
    pub(crate) registry: Arc<Registry>,
    pub(crate) config: PollConfig,
    pub(crate) handle: JobHandle,
    pub(crate) key: JobKey,
    pub(crate) serial: u64,
    pub(crate) cancel: CancellationToken,
}

impl PollTask {
    /// Drive the job to a terminal outcome.
    ///
    /// The timeout is measured from the first poll, not from submission.
    pub(crate) async fn run(self) {
        let deadline = Instant::now() + self.config.timeout;
        let mut schedule = PollSchedule::new(self.config.clone());
        let mut polls: u32 = 0;

        loop {
            if Instant::now() >= deadline {
                self.time_out(polls);
                return;
            }

            polls += 1;
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::debug!(job_id = %self.handle.job_id, "Polling stopped by cancellation");
                    return;
                }
                _ = tokio::time::sleep_until(deadline) => {
                    self.time_out(polls);
                    return;
                }
                response = self.backend.status(
                    self.handle.kind,
                    &self.handle.subject_id,
                    &self.handle.job_id,
                ) => response,
            };

            let status = match response
                .map_err(|e| e.to_string())
                .and_then(|body| JobStatus::from_body(&body).map_err(|e| e.to_string()))
            {
                Ok(status) => status,
                Err(message) => {
                    tracing::error!(
                        job_id = %self.handle.job_id,
                        error = %message,
                        "Status check failed",
                    );
                    self.finish(JobEvent::Error {
                        handle: self.handle.clone(),
                        message: format!("Status check failed: {message}"),
                    });
                    return;
                }
            };

            tracing::debug!(
                job_id = %self.handle.job_id,
                status = status.status.as_str(),
                progress = status.progress,
                current_step = %status.current_step,
                "Polled job status",
            );

            match status.status {
                JobState::Completed => {
                    self.complete().await;
                    return;
                }
                JobState::Failed | JobState::Error => {
                    let message = status
                        .error_message
                        .filter(|m| !m.trim().is_empty())
                        .unwrap_or_else(|| "Generation failed".to_string());
                    tracing::warn!(
                        job_id = %self.handle.job_id,
                        status = status.status.as_str(),
                        error = %message,
                        "Generation failed",
                    );
                    self.finish(JobEvent::Failed {
                        handle: self.handle.clone(),
                        reason: FailureReason::Generation,
                        message,
                    });
                    return;
                }
                JobState::Queued | JobState::Started | JobState::Processing => {}
            }

            let delay = schedule.observe(status.progress);
            if status.progress < schedule.last_progress() {
                tracing::warn!(
                    job_id = %self.handle.job_id,
                    reported = status.progress,
                    highest = schedule.last_progress(),
                    "Backend reported regressing progress",
                );
            }

            let shown = JobStatus {
                progress: schedule.last_progress(),
                ..status
            };
            let delivered = self.registry.emit_if_active(
                &self.key,
                self.serial,
                JobEvent::Progress {
                    handle: self.handle.clone(),
                    status: shown,
                },
            );
            if !delivered {
                return;
            }

            let wake = (Instant::now() + delay).min(deadline);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    /// Fetch the result once and emit the matching terminal event.
    async fn complete(&self) {
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            fetched = fetch_result(self.backend.as_ref(), &self.handle) => fetched,
        };

        let event = match fetched {
            Ok(result) => {
                tracing::info!(
                    job_id = %self.handle.job_id,
                    kind = %self.handle.kind,
                    subject_id = %self.handle.subject_id,
                    "Generation completed",
                );
                JobEvent::Completed {
                    handle: self.handle.clone(),
                    result,
                }
            }
            Err(e) => {
                tracing::error!(
                    job_id = %self.handle.job_id,
                    error = %e,
                    "Generation completed but result retrieval failed",
                );
                JobEvent::Failed {
                    handle: self.handle.clone(),
                    reason: FailureReason::ResultUnavailable,
                    message: format!(
                        "Generation completed but the result could not be retrieved: {e}"
                    ),
                }
            }
        };
        self.finish(event);
    }

    fn time_out(&self, polls: u32) {
        tracing::warn!(
            job_id = %self.handle.job_id,
            polls,
            timeout_secs = self.config.timeout.as_secs(),
            "Generation timed out",
        );
        self.finish(JobEvent::Timeout {
            handle: self.handle.clone(),
            message: format!(
                "Generation did not finish within {} minutes",
                self.config.timeout.as_secs().div_ceil(60)
            ),
        });
    }

    fn finish(&self, event: JobEvent) {
        if !self.registry.finish(&self.key, self.serial, event) {
            tracing::debug!(
                job_id = %self.handle.job_id,
                "Dropping outcome for job that is no longer active",
            );
        }
    }
}
