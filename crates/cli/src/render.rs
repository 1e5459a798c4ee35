//! Terminal rendering of [`GenerationState`] changes.

use scei_core::job_result::JobResult;
use scei_jobs::tracker::{GenerationState, ProgressSnapshot};

/// How a tracked generation ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed(JobResult),
    /// Failure, error or timeout, with the message to show.
    Failed(String),
}

/// The final outcome, or `None` while the generation is still running
/// (or has not started).
pub fn outcome(state: &GenerationState) -> Option<Outcome> {
    if state.is_generating {
        return None;
    }
    if let Some(result) = &state.result {
        return Some(Outcome::Completed(result.clone()));
    }

    let progress = state.progress.as_ref()?;
    if !progress.status.is_terminal() {
        return None;
    }
    let message = progress
        .error_message
        .clone()
        .unwrap_or_else(|| progress.current_step.clone());
    Some(Outcome::Failed(message))
}

/// One human-readable status line.
pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    let mut line = format!(
        "[{:>3}%] {}",
        snapshot.progress,
        snapshot.status.as_str()
    );
    if !snapshot.current_step.is_empty() {
        line.push_str(": ");
        line.push_str(&snapshot.current_step);
    }
    if let Some(error) = &snapshot.error_message {
        line.push_str(" (");
        line.push_str(error);
        line.push(')');
    }
    line
}

/// Emits a line only when the rendered progress actually changed.
#[derive(Debug, Default)]
pub struct ProgressRenderer {
    last: Option<String>,
}

impl ProgressRenderer {
    pub fn next_line(&mut self, state: &GenerationState) -> Option<String> {
        let line = progress_line(state.progress.as_ref()?);
        if self.last.as_deref() == Some(line.as_str()) {
            return None;
        }
        self.last = Some(line.clone());
        Some(line)
    }
}
