//! Job result assembly and the external output shape.

use serde::Serialize;

use crate::artifact::MaterializedArtifact;
use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Error,
}

/// A single payload, or one entry per artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultMessage {
    Single(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    pub status: JobStatus,
    pub message: ResultMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    pub refresh_worker: bool,
}

/// What the worker hands back to the platform.
///
/// Serializes either as `{"error": "..."}` or as the flattened
/// [`JobResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum JobOutput {
    Failed { error: String },
    Completed(JobResult),
}

impl JobOutput {
    /// Map a terminal pipeline error onto the output shape.
    ///
    /// Upload failures keep their per-asset details and the refresh
    /// directive; every other error collapses to `{"error": ...}`.
    pub fn from_error(err: JobError, refresh_worker: bool) -> Self {
        let message = err.to_string();
        match err {
            JobError::Upload { details } => JobOutput::Completed(JobResult {
                status: JobStatus::Error,
                message: ResultMessage::Single(message),
                details: Some(details),
                refresh_worker,
            }),
            _ => JobOutput::Failed { error: message },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            JobOutput::Completed(JobResult {
                status: JobStatus::Success,
                ..
            })
        )
    }
}

/// Compose the final result from materialized artifacts.
///
/// The status is `error` as soon as one artifact failed; failures stay
/// in the message list at their descriptor position. A single artifact
/// yields a plain string message.
pub fn assemble(artifacts: &[MaterializedArtifact], refresh_worker: bool) -> JobOutput {
    if artifacts.is_empty() {
        return JobOutput::from_error(JobError::NoArtifacts, refresh_worker);
    }

    let status = if artifacts.iter().any(MaterializedArtifact::is_failed) {
        JobStatus::Error
    } else {
        JobStatus::Success
    };

    let message = match artifacts {
        [only] => ResultMessage::Single(only.message().to_string()),
        many => ResultMessage::Many(many.iter().map(|a| a.message().to_string()).collect()),
    };

    JobOutput::Completed(JobResult {
        status,
        message,
        details: None,
        refresh_worker,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::artifact::{ArtifactKind, ArtifactPayload, OutputArtifactDescriptor};

    fn artifact(filename: &str, payload: ArtifactPayload) -> MaterializedArtifact {
        MaterializedArtifact {
            descriptor: OutputArtifactDescriptor {
                kind: ArtifactKind::Image,
                subfolder: String::new(),
                filename: filename.into(),
            },
            payload,
        }
    }

    #[test]
    fn single_success_is_a_plain_string() {
        let out = assemble(&[artifact("a.png", ArtifactPayload::Inline("QUJD".into()))], false);
        assert!(out.is_success());
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({ "status": "success", "message": "QUJD", "refresh_worker": false })
        );
    }

    #[test]
    fn multiple_artifacts_keep_order() {
        let out = assemble(
            &[
                artifact("a.mp4", ArtifactPayload::Stored("renders/j/a.mp4".into())),
                artifact("b.mp4", ArtifactPayload::Stored("renders/j/b.mp4".into())),
            ],
            true,
        );
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "status": "success",
                "message": ["renders/j/a.mp4", "renders/j/b.mp4"],
                "refresh_worker": true
            })
        );
    }

    #[test]
    fn any_failure_makes_the_job_an_error() {
        let out = assemble(
            &[
                artifact("a.png", ArtifactPayload::Inline("QQ==".into())),
                artifact(
                    "b.png",
                    ArtifactPayload::Failed("Output file does not exist: /o/b.png".into()),
                ),
            ],
            false,
        );
        assert!(!out.is_success());
        let value = serde_json::to_value(&out).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"][1], "Output file does not exist: /o/b.png");
    }

    #[test]
    fn nothing_produced_is_an_error() {
        let out = assemble(&[], false);
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({ "error": "No output artifacts were produced" })
        );
    }

    #[test]
    fn upload_error_keeps_details() {
        let out = JobOutput::from_error(
            JobError::Upload {
                details: vec!["Error uploading a.png: bad".into()],
            },
            true,
        );
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({
                "status": "error",
                "message": "Some images failed to upload",
                "details": ["Error uploading a.png: bad"],
                "refresh_worker": true
            })
        );
    }

    #[test]
    fn other_errors_collapse_to_error_object() {
        let out = JobOutput::from_error(JobError::Timeout, false);
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({ "error": "Max retries reached while waiting for image generation" })
        );
    }
}
