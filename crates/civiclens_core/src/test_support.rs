//! Scripted backend and recording sleeper shared by unit and integration tests.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::backend::{JobSnapshot, JobStatus, ResponsesBackend};
use crate::error::{CoreError, CoreResult};
use crate::poller::Sleeper;
use crate::request::JobSpec;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn snapshot(id: &str, status: JobStatus) -> JobSnapshot {
    JobSnapshot {
        id: id.to_string(),
        status,
        output: Vec::new(),
        error: None,
    }
}

/// A completed job whose final message carries `text`.
pub fn completed_with_text(id: &str, text: &str) -> JobSnapshot {
    JobSnapshot {
        output: vec![
            json!({
                "type": "web_search_call",
                "action": {
                    "type": "search",
                    "sources": [
                        { "url": "https://ballotpedia.org/A", "title": "A - Ballotpedia" }
                    ]
                }
            }),
            message_item(text),
        ],
        ..snapshot(id, JobStatus::Completed)
    }
}

pub fn message_item(text: &str) -> Value {
    json!({
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "output_text", "text": text, "annotations": [] }]
    })
}

/// Plays back scripted results for `create` and `retrieve`.
pub struct ScriptedBackend {
    creates: Mutex<VecDeque<CoreResult<JobSnapshot>>>,
    retrieves: Mutex<VecDeque<CoreResult<JobSnapshot>>>,
    create_calls: AtomicUsize,
    retrieve_calls: AtomicUsize,
    submitted: Mutex<Vec<JobSpec>>,
}

impl ScriptedBackend {
    pub fn new(retrieves: Vec<CoreResult<JobSnapshot>>) -> Self {
        Self {
            creates: Mutex::new(VecDeque::new()),
            retrieves: Mutex::new(retrieves.into()),
            create_calls: AtomicUsize::new(0),
            retrieve_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_creates(self, creates: Vec<CoreResult<JobSnapshot>>) -> Self {
        *locked(&self.creates) = creates.into();
        self
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn retrieve_calls(&self) -> usize {
        self.retrieve_calls.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<JobSpec> {
        locked(&self.submitted).clone()
    }
}

#[async_trait]
impl ResponsesBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn create(&self, spec: &JobSpec) -> CoreResult<JobSnapshot> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.submitted).push(spec.clone());
        locked(&self.creates)
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot("resp_test", JobStatus::Queued)))
    }

    async fn retrieve(&self, _job_id: &str) -> CoreResult<JobSnapshot> {
        self.retrieve_calls.fetch_add(1, Ordering::SeqCst);
        locked(&self.retrieves)
            .pop_front()
            .unwrap_or_else(|| Err(CoreError::internal("script exhausted")))
    }
}

#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        locked(&self.waits).clone()
    }

    pub fn total(&self) -> Duration {
        self.recorded().into_iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        locked(&self.waits).push(duration);
    }
}
