//! Artifact materialization.
//!
//! Reads each artifact the engine reported from the shared output
//! directory and turns it into either an inline base64 payload or a
//! reference to an uploaded object. Failures are recorded per artifact
//! and never abort the job.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use comfyrun_core::artifact::{ArtifactPayload, MaterializedArtifact, OutputArtifactDescriptor};
use comfyrun_core::error::ArtifactError;
use comfyrun_storage::ObjectStore;

/// Everything materialization needs besides the descriptor.
pub struct MaterializeContext<'a> {
    pub output_dir: &'a Path,
    pub job_id: &'a str,
    /// Upload destination. `None` means inline payloads.
    pub store: Option<&'a dyn ObjectStore>,
}

/// Object key for an artifact: `{job_id}/{filename}` for every kind.
pub fn storage_key(job_id: &str, descriptor: &OutputArtifactDescriptor) -> String {
    format!("{job_id}/{}", descriptor.filename)
}

/// Materialize one artifact.
pub async fn materialize(
    descriptor: &OutputArtifactDescriptor,
    ctx: &MaterializeContext<'_>,
) -> MaterializedArtifact {
    let payload = match deliver(descriptor, ctx).await {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(
                filename = %descriptor.filename,
                kind = ?descriptor.kind,
                error = %e,
                "Artifact materialization failed",
            );
            ArtifactPayload::Failed(e.to_string())
        }
    };

    MaterializedArtifact {
        descriptor: descriptor.clone(),
        payload,
    }
}

/// Materialize every artifact in order, one at a time.
pub async fn materialize_all(
    descriptors: &[OutputArtifactDescriptor],
    ctx: &MaterializeContext<'_>,
) -> Vec<MaterializedArtifact> {
    let mut artifacts = Vec::with_capacity(descriptors.len());
    for descriptor in descriptors {
        artifacts.push(materialize(descriptor, ctx).await);
    }
    artifacts
}

async fn deliver(
    descriptor: &OutputArtifactDescriptor,
    ctx: &MaterializeContext<'_>,
) -> Result<ArtifactPayload, ArtifactError> {
    let path = descriptor
        .local_path(ctx.output_dir)
        .ok_or_else(|| ArtifactError::Missing {
            path: naive_path(ctx.output_dir, descriptor),
        })?;

    tracing::debug!(path = %path.display(), "Reading artifact");
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArtifactError::Missing { path });
        }
        Err(source) => return Err(ArtifactError::Read { path, source }),
    };

    match ctx.store {
        Some(store) => {
            let key = storage_key(ctx.job_id, descriptor);
            let reference = store
                .put_object(&key, bytes)
                .await
                .map_err(|e| ArtifactError::Storage(e.to_string()))?;
            Ok(ArtifactPayload::Stored(reference))
        }
        None => Ok(ArtifactPayload::Inline(STANDARD.encode(bytes))),
    }
}

/// The path as the engine described it, for error messages when the
/// contained path could not be resolved.
fn naive_path(output_dir: &Path, descriptor: &OutputArtifactDescriptor) -> PathBuf {
    output_dir
        .join(&descriptor.subfolder)
        .join(&descriptor.filename)
}
