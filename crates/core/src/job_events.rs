//! Event name constants for generation job lifecycle notifications.
//!
//! Used as the serialized `type` tag of job events.

/// Progress update while the job is running.
pub const EVENT_JOB_PROGRESS: &str = "job_progress";

/// Job completed and its result was retrieved.
pub const EVENT_JOB_COMPLETED: &str = "job_completed";

/// Backend reported failure, or the result could not be retrieved.
pub const EVENT_JOB_FAILED: &str = "job_failed";

/// No terminal status within the polling deadline.
pub const EVENT_JOB_TIMEOUT: &str = "job_timeout";

/// A status check itself failed.
pub const EVENT_JOB_ERROR: &str = "job_error";

/// Job was cancelled by the client.
pub const EVENT_JOB_CANCELLED: &str = "job_cancelled";
