//! Stage events emitted while a job runs.
//!
//! The handler reports every stage boundary to an [`EventSink`]. The
//! default [`TracingSink`] turns them into `tracing` events.

use serde::Serialize;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    Probe,
    Upload,
    Submit,
    Poll,
    Resolve,
    Materialize,
    Assemble,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Probe => "probe",
            Self::Upload => "upload",
            Self::Submit => "submit",
            Self::Poll => "poll",
            Self::Resolve => "resolve",
            Self::Materialize => "materialize",
            Self::Assemble => "assemble",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEvent {
    pub stage: Stage,
    pub outcome: Outcome,
    pub detail: String,
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: StageEvent);
}

/// Forwards stage events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: StageEvent) {
        match event.outcome {
            Outcome::Success => tracing::info!(
                stage = event.stage.as_str(),
                detail = %event.detail,
                "Stage succeeded",
            ),
            Outcome::Failure => tracing::warn!(
                stage = event.stage.as_str(),
                detail = %event.detail,
                "Stage failed",
            ),
        }
    }
}
