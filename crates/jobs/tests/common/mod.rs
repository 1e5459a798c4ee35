//! Scripted in-memory [`GenerationBackend`] shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scei_core::generation::SubmitRequest;
use scei_core::types::GenerationKind;
use scei_jobs::api::{ApiError, ApiResponse, GenerationBackend};
use scei_jobs::events::JobEvent;
use scei_jobs::manager::JobManager;
use scei_jobs::schedule::PollConfig;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::Instant;

/// One scripted backend answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Ok(Value),
    /// Non-2xx answer with the given body.
    Http(u16, String),
}

impl Reply {
    fn into_result(self) -> Result<Value, ApiError> {
        match self {
            Self::Ok(body) => Ok(body),
            Self::Http(status, body) => Err(ApiError::Api { status, body }),
        }
    }
}

pub struct ScriptedBackend {
    submit_status: Mutex<u16>,
    /// Consumed in order; the last one repeats forever.
    submit_replies: Mutex<VecDeque<Reply>>,
    /// Replies are consumed in order; the last one repeats forever.
    status_replies: Mutex<VecDeque<Reply>>,
    /// Per-job status scripts, taking precedence over `status_replies`.
    job_statuses: Mutex<HashMap<String, VecDeque<Reply>>>,
    content_reply: Mutex<Reply>,
    held_status: Mutex<Option<oneshot::Receiver<()>>>,
    held_submit: Mutex<Option<oneshot::Receiver<()>>>,
    pub status_entered: Notify,
    pub submit_entered: Notify,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    content_calls: AtomicUsize,
    status_times: Mutex<Vec<Instant>>,
    last_request: Mutex<Option<SubmitRequest>>,
}

impl ScriptedBackend {
    /// Accepts submissions as job `J1` and reports `processing` at 10 %.
    pub fn new() -> Self {
        Self {
            submit_status: Mutex::new(202),
            submit_replies: Mutex::new(VecDeque::from([accepted("J1")])),
            status_replies: Mutex::new(VecDeque::from([processing(10)])),
            job_statuses: Mutex::new(HashMap::new()),
            content_reply: Mutex::new(Reply::Ok(json!({
                "latex_content": "\\documentclass{book}",
                "generation_method": "dynamic_chapters",
                "generated_at": "2024-01-01T00:00:00Z",
            }))),
            held_status: Mutex::new(None),
            held_submit: Mutex::new(None),
            status_entered: Notify::new(),
            submit_entered: Notify::new(),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            content_calls: AtomicUsize::new(0),
            status_times: Mutex::new(Vec::new()),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_submit(self, status: u16, reply: Reply) -> Self {
        *self.submit_status.lock().unwrap() = status;
        *self.submit_replies.lock().unwrap() = VecDeque::from([reply]);
        self
    }

    /// Accept one submission per reply, in order.
    pub fn with_submits(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        *self.submit_replies.lock().unwrap() = replies.into_iter().collect();
        self
    }

    /// Script the status replies of one job id.
    pub fn with_job_statuses(self, job_id: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.job_statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), replies.into_iter().collect());
        self
    }

    pub fn with_statuses(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        *self.status_replies.lock().unwrap() = replies.into_iter().collect();
        self
    }

    pub fn with_content(self, reply: Reply) -> Self {
        *self.content_reply.lock().unwrap() = reply;
        self
    }

    /// Make the next status request wait until the returned sender fires
    /// (or is dropped).
    pub fn hold_next_status(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.held_status.lock().unwrap() = Some(rx);
        tx
    }

    /// Make the next submission wait until the returned sender fires
    /// (or is dropped).
    pub fn hold_next_submit(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.held_submit.lock().unwrap() = Some(rx);
        tx
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    /// Gaps between consecutive status requests.
    pub fn status_gaps(&self) -> Vec<Duration> {
        let times = self.status_times.lock().unwrap();
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    pub fn last_request(&self) -> Option<SubmitRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn submit(
        &self,
        _kind: GenerationKind,
        _subject_id: &str,
        request: &SubmitRequest,
    ) -> Result<ApiResponse, ApiError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.submit_entered.notify_one();

        let held = self.held_submit.lock().unwrap().take();
        if let Some(rx) = held {
            let _ = rx.await;
        }

        let status = *self.submit_status.lock().unwrap();
        let reply = next_reply(&mut self.submit_replies.lock().unwrap());
        let body = reply
            .unwrap_or_else(|| Reply::Http(500, "no scripted submission".into()))
            .into_result()?;
        Ok(ApiResponse { status, body })
    }

    async fn status(
        &self,
        _kind: GenerationKind,
        _subject_id: &str,
        job_id: &str,
    ) -> Result<Value, ApiError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status_times.lock().unwrap().push(Instant::now());
        self.status_entered.notify_one();

        let held = self.held_status.lock().unwrap().take();
        if let Some(rx) = held {
            let _ = rx.await;
        }

        let reply = match self.job_statuses.lock().unwrap().get_mut(job_id) {
            Some(replies) => next_reply(replies),
            None => next_reply(&mut self.status_replies.lock().unwrap()),
        };
        reply
            .unwrap_or_else(|| Reply::Http(500, "no scripted status".into()))
            .into_result()
    }

    async fn content(
        &self,
        _kind: GenerationKind,
        _subject_id: &str,
        _job_id: &str,
    ) -> Result<Value, ApiError> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.content_reply.lock().unwrap().clone().into_result()
    }
}

fn next_reply(replies: &mut VecDeque<Reply>) -> Option<Reply> {
    if replies.len() > 1 {
        replies.pop_front()
    } else {
        replies.front().cloned()
    }
}

pub fn accepted(job_id: &str) -> Reply {
    Reply::Ok(json!({
        "job_id": job_id,
        "estimated_duration": "10-25 minutes",
    }))
}

pub fn failed(message: &str) -> Reply {
    Reply::Ok(json!({"status": "failed", "progress": 0, "error_message": message}))
}

pub fn processing(progress: u8) -> Reply {
    Reply::Ok(json!({
        "status": "processing",
        "progress": progress,
        "current_step": format!("Working ({progress}%)"),
    }))
}

pub fn completed() -> Reply {
    Reply::Ok(json!({"status": "completed", "progress": 100, "current_step": "Done"}))
}

pub fn manager_for(backend: &Arc<ScriptedBackend>) -> Arc<JobManager> {
    Arc::new(JobManager::new(
        Arc::clone(backend) as Arc<dyn GenerationBackend>,
        PollConfig::default(),
    ))
}

/// Receive events until the first terminal one, returning all of them.
pub async fn collect_until_terminal(rx: &mut mpsc::UnboundedReceiver<JobEvent>) -> Vec<JobEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let terminal = event.is_terminal();
        events.push(event);
        if terminal {
            break;
        }
    }
    events
}
