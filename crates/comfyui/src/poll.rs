//! Completion polling.
//!
//! A submitted prompt is either *waiting* or *done*. Each attempt asks
//! the engine for the prompt's history; the poller moves to *done* the
//! first time that history carries non-empty outputs. A transport or
//! engine error aborts the loop immediately instead of burning the
//! remaining budget.

use std::time::Duration;

use comfyrun_core::clock::Sleeper;
use comfyrun_core::error::JobError;
use serde_json::Value;

use crate::engine::RenderEngine;
use crate::history::completed_outputs;

/// Poll until `prompt_id` has outputs, for at most `max_retries`
/// attempts spaced `interval` apart. Returns the prompt's `outputs`.
pub async fn wait_for_outputs(
    engine: &dyn RenderEngine,
    prompt_id: &str,
    max_retries: u32,
    interval: Duration,
    sleeper: &dyn Sleeper,
) -> Result<Value, JobError> {
    tracing::info!(prompt_id, max_retries, "Waiting for generation to complete");

    for attempt in 1..=max_retries {
        let history = engine.get_history(prompt_id).await.map_err(|e| {
            tracing::error!(prompt_id, attempt, error = %e, "History request failed");
            JobError::Poll(e.to_string())
        })?;

        if let Some(outputs) = completed_outputs(&history, prompt_id) {
            tracing::info!(prompt_id, attempt, "Generation complete");
            return Ok(outputs.clone());
        }

        tracing::trace!(prompt_id, attempt, "Outputs not ready");
        if attempt < max_retries {
            sleeper.sleep(interval).await;
        }
    }

    tracing::warn!(prompt_id, max_retries, "Polling budget exhausted");
    Err(JobError::Timeout)
}
