//! Input asset upload.

use comfyrun_core::error::JobError;
use comfyrun_core::job::InputAsset;
use comfyrun_core::result::JobStatus;

use crate::engine::RenderEngine;

/// Outcome of pushing every input asset to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub status: JobStatus,
    pub message: String,
    /// Per-asset outcomes. On success one entry per uploaded asset; on
    /// error one entry per failed asset, in input order.
    pub details: Vec<String>,
}

impl UploadReport {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }

    /// Turn a failed report into [`JobError::Upload`].
    pub fn into_result(self) -> Result<Vec<String>, JobError> {
        match self.status {
            JobStatus::Success => Ok(self.details),
            JobStatus::Error => Err(JobError::Upload {
                details: self.details,
            }),
        }
    }
}

/// Upload every asset in order. A failed asset does not stop the
/// remaining ones from being attempted.
pub async fn upload_assets(engine: &dyn RenderEngine, assets: &[InputAsset]) -> UploadReport {
    if assets.is_empty() {
        return UploadReport {
            status: JobStatus::Success,
            message: "No images to upload".to_string(),
            details: Vec::new(),
        };
    }

    tracing::info!(count = assets.len(), "Uploading input images");

    let mut uploaded = Vec::new();
    let mut errors = Vec::new();

    for asset in assets {
        let bytes = match asset.decode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(asset = %asset.name, error = %e, "Input image is not valid base64");
                errors.push(format!("Error decoding {}: {e}", asset.name));
                continue;
            }
        };

        match engine.upload_image(&asset.name, bytes).await {
            Ok(()) => {
                tracing::debug!(asset = %asset.name, "Uploaded input image");
                uploaded.push(format!("Successfully uploaded {}", asset.name));
            }
            Err(e) => {
                tracing::warn!(asset = %asset.name, error = %e, "Input image upload failed");
                errors.push(format!("Error uploading {}: {e}", asset.name));
            }
        }
    }

    if errors.is_empty() {
        tracing::info!("Input image upload complete");
        UploadReport {
            status: JobStatus::Success,
            message: "All images uploaded successfully".to_string(),
            details: uploaded,
        }
    } else {
        tracing::warn!(failed = errors.len(), "Input image upload finished with errors");
        UploadReport {
            status: JobStatus::Error,
            message: "Some images failed to upload".to_string(),
            details: errors,
        }
    }
}
