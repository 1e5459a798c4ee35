//! Domain types for SCEI content-generation jobs.
//!
//! Pure data and validation only: generation kinds and request options,
//! job status snapshots, job handles, and normalized job results. All
//! network and scheduling concerns live in `scei-jobs`.

pub mod error;
pub mod generation;
pub mod job;
pub mod job_events;
pub mod job_result;
pub mod job_status;
pub mod types;
