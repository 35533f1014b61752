use std::path::PathBuf;

/// Terminal failures of a job. Any of these ends the pipeline; the
/// `Display` text is the message returned to the caller.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Raw input was missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The availability probe was exhausted and the config requires the
    /// engine to be up before submission.
    #[error("Render engine at {0} did not become available")]
    EngineUnavailable(String),

    /// One or more input assets did not reach the engine. Carries one
    /// message per failed asset, in input order.
    #[error("Some images failed to upload")]
    Upload { details: Vec<String> },

    /// The engine rejected the workflow or the request never reached it.
    #[error("Error queuing workflow: {0}")]
    Submission(String),

    /// Transport failure while querying job history.
    #[error("Error waiting for image generation: {0}")]
    Poll(String),

    /// The polling budget ran out before outputs appeared.
    #[error("Max retries reached while waiting for image generation")]
    Timeout,

    /// The engine finished but its output record names no artifacts.
    #[error("No output artifacts were produced")]
    NoArtifacts,
}

/// Failure to materialize a single artifact. Recorded in the job
/// result next to its siblings instead of aborting the job.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Output file does not exist: {}", path.display())]
    Missing { path: PathBuf },

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage upload failed: {0}")]
    Storage(String),
}

/// Invalid value in the process configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidInteger { var: &'static str, value: String },

    #[error("{var} must be 'true' or 'false', got '{value}'")]
    InvalidBool { var: &'static str, value: String },
}
