//! In-memory [`RenderEngine`] that follows a script.
//!
//! Used by the stage tests here and by the worker's end-to-end tests.
//! Every call is recorded so tests can assert on what reached the
//! engine and in which order.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::ComfyUIApiError;
use crate::engine::RenderEngine;

/// A call received by a [`ScriptedEngine`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Probe,
    Upload(String, Vec<u8>),
    Submit(Value),
    History(String),
}

#[derive(Debug, Clone)]
enum Submission {
    Accept(String),
    Reject { status: u16, body: String },
    NoPromptId,
}

#[derive(Debug, Clone)]
enum HistoryStep {
    Document(Value),
    Fail { status: u16, body: String },
}

/// Scripted engine. Defaults: always available, every upload accepted,
/// submissions answered with prompt id `p1`, history always `{}`.
#[derive(Debug)]
pub struct ScriptedEngine {
    /// Failed probes before the engine reports ready; `None` never does.
    probes_until_ready: Mutex<Option<u32>>,
    upload_failures: HashMap<String, (u16, String)>,
    submission: Submission,
    /// Consumed front to back; the last step repeats once reached.
    history: Mutex<VecDeque<HistoryStep>>,
    calls: Mutex<Vec<EngineCall>>,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            probes_until_ready: Mutex::new(Some(0)),
            upload_failures: HashMap::new(),
            submission: Submission::Accept("p1".to_string()),
            history: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable(self) -> Self {
        *lock(&self.probes_until_ready) = None;
        self
    }

    pub fn available_after(self, failed_probes: u32) -> Self {
        *lock(&self.probes_until_ready) = Some(failed_probes);
        self
    }

    pub fn fail_upload(mut self, name: &str, status: u16, body: &str) -> Self {
        self.upload_failures
            .insert(name.to_string(), (status, body.to_string()));
        self
    }

    pub fn submit_as(mut self, prompt_id: &str) -> Self {
        self.submission = Submission::Accept(prompt_id.to_string());
        self
    }

    pub fn reject_submission(mut self, status: u16, body: &str) -> Self {
        self.submission = Submission::Reject {
            status,
            body: body.to_string(),
        };
        self
    }

    pub fn submit_without_prompt_id(mut self) -> Self {
        self.submission = Submission::NoPromptId;
        self
    }

    /// Append a history document to the script.
    pub fn history(self, document: Value) -> Self {
        lock(&self.history).push_back(HistoryStep::Document(document));
        self
    }

    /// Append a failing history request to the script.
    pub fn history_failure(self, status: u16, body: &str) -> Self {
        lock(&self.history).push_back(HistoryStep::Fail {
            status,
            body: body.to_string(),
        });
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.calls).clone()
    }

    pub fn history_calls(&self) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| matches!(c, EngineCall::History(_)))
            .count()
    }

    fn record(&self, call: EngineCall) {
        lock(&self.calls).push(call);
    }

    fn next_history(&self) -> HistoryStep {
        let mut script = lock(&self.history);
        if script.len() > 1 {
            script.pop_front().unwrap_or(HistoryStep::Document(Value::Object(Default::default())))
        } else {
            script
                .front()
                .cloned()
                .unwrap_or(HistoryStep::Document(Value::Object(Default::default())))
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RenderEngine for ScriptedEngine {
    fn base_url(&self) -> &str {
        "http://scripted-engine"
    }

    async fn is_available(&self) -> bool {
        self.record(EngineCall::Probe);
        let mut remaining = lock(&self.probes_until_ready);
        match remaining.as_mut() {
            None => false,
            Some(0) => true,
            Some(n) => {
                *n -= 1;
                false
            }
        }
    }

    async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<(), ComfyUIApiError> {
        self.record(EngineCall::Upload(name.to_string(), bytes));
        match self.upload_failures.get(name) {
            Some((status, body)) => Err(ComfyUIApiError::ApiError {
                status: *status,
                body: body.clone(),
            }),
            None => Ok(()),
        }
    }

    async fn submit_workflow(&self, workflow: &Value) -> Result<String, ComfyUIApiError> {
        self.record(EngineCall::Submit(workflow.clone()));
        match &self.submission {
            Submission::Accept(id) => Ok(id.clone()),
            Submission::Reject { status, body } => Err(ComfyUIApiError::ApiError {
                status: *status,
                body: body.clone(),
            }),
            Submission::NoPromptId => Err(ComfyUIApiError::MissingField("prompt_id")),
        }
    }

    async fn get_history(&self, prompt_id: &str) -> Result<Value, ComfyUIApiError> {
        self.record(EngineCall::History(prompt_id.to_string()));
        match self.next_history() {
            HistoryStep::Document(doc) => Ok(doc),
            HistoryStep::Fail { status, body } => Err(ComfyUIApiError::ApiError { status, body }),
        }
    }
}
