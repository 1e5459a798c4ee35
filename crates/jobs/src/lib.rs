//! Client-side orchestration of long-running SCEI generation jobs.
//!
//! Submits study-guide and presentation generation jobs to the backend,
//! polls their status on an adaptive schedule, fetches the finished
//! artifact, and reports every lifecycle step as a typed [`JobEvent`].
//! [`GenerationTracker`] folds those events into one observable state
//! value for a consumer.

pub mod api;
pub mod config;
pub mod events;
pub mod fetch;
pub mod manager;
mod poller;
pub mod schedule;
pub mod submit;
pub mod tracker;

pub use api::{ApiError, ApiResponse, GenerationBackend, HttpBackend};
pub use events::{FailureReason, JobEvent};
pub use manager::JobManager;
pub use schedule::{PollConfig, PollSchedule};
pub use submit::SubmitError;
pub use tracker::{GenerationState, GenerationTracker, ProgressSnapshot, ProgressStatus};
