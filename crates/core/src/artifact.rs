//! Output artifact descriptors.
//!
//! The engine's history record maps node ids to node outputs. Image
//! nodes report an `images` array; video nodes report either a single
//! `video` object or a `gifs` array (the VideoHelperSuite convention).
//! [`resolve_artifacts`] flattens all of them into one ordered list so
//! images and videos share a single materialization path.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of file an artifact is. Determined from the shape of the
/// node output, never from caller input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
}

/// A file the engine reports having written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputArtifactDescriptor {
    pub kind: ArtifactKind,
    /// Path relative to the engine output directory. May be empty.
    pub subfolder: String,
    pub filename: String,
}

impl OutputArtifactDescriptor {
    /// Resolve the artifact's location under `output_dir`.
    ///
    /// Returns `None` when `subfolder` or `filename` would escape the
    /// output directory (absolute paths, `..` components).
    pub fn local_path(&self, output_dir: &Path) -> Option<PathBuf> {
        let relative = Path::new(&self.subfolder).join(&self.filename);
        let contained = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained || self.filename.is_empty() {
            return None;
        }
        Some(output_dir.join(relative))
    }
}

/// How an artifact ended up being delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPayload {
    /// File contents, base64-encoded.
    Inline(String),
    /// Reference to the uploaded object in remote storage.
    Stored(String),
    /// Materialization failed; human-readable reason.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedArtifact {
    pub descriptor: OutputArtifactDescriptor,
    pub payload: ArtifactPayload,
}

impl MaterializedArtifact {
    pub fn is_failed(&self) -> bool {
        matches!(self.payload, ArtifactPayload::Failed(_))
    }

    /// The string that goes into the job result message.
    pub fn message(&self) -> &str {
        match &self.payload {
            ArtifactPayload::Inline(s)
            | ArtifactPayload::Stored(s)
            | ArtifactPayload::Failed(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct FileRef {
    filename: String,
    #[serde(default)]
    subfolder: String,
}

/// Extract every artifact descriptor from a completed job's `outputs`.
///
/// Nodes are visited in map order; within a node, images come before
/// videos. Entries that do not name a file are skipped. An empty result
/// is valid and means the job produced nothing.
pub fn resolve_artifacts(outputs: &Value) -> Vec<OutputArtifactDescriptor> {
    let Some(nodes) = outputs.as_object() else {
        return Vec::new();
    };

    let mut descriptors = Vec::new();
    for node_output in nodes.values() {
        if let Some(images) = node_output.get("images").and_then(Value::as_array) {
            descriptors.extend(images.iter().filter_map(|v| descriptor(ArtifactKind::Image, v)));
        }
        if let Some(video) = node_output.get("video").filter(|v| v.is_object()) {
            descriptors.extend(descriptor(ArtifactKind::Video, video));
        }
        if let Some(gifs) = node_output.get("gifs").and_then(Value::as_array) {
            descriptors.extend(gifs.iter().filter_map(|v| descriptor(ArtifactKind::Video, v)));
        }
    }
    descriptors
}

fn descriptor(kind: ArtifactKind, value: &Value) -> Option<OutputArtifactDescriptor> {
    let file: FileRef = serde_json::from_value(value.clone()).ok()?;
    Some(OutputArtifactDescriptor {
        kind,
        subfolder: file.subfolder,
        filename: file.filename,
    })
}
