//! Command-line front end for SCEI generation jobs.
//!
//! The binary lives in `main.rs`; argument parsing and progress rendering
//! are kept here so they can be tested without a terminal.

pub mod args;
pub mod render;

pub use args::CliArgs;
pub use render::{outcome, Outcome, ProgressRenderer};
