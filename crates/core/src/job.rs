//! Job input parsing and validation.
//!
//! The hosting platform hands the worker a [`JobEnvelope`]; its `input`
//! is untyped JSON (or a JSON-encoded string) and is turned into a
//! typed [`JobRequest`] by [`validate_input`] before anything touches
//! the network.

use std::collections::HashSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::JobError;

const MSG_NO_INPUT: &str = "Please provide input";
const MSG_INVALID_JSON: &str = "Invalid JSON format in input";
const MSG_NOT_OBJECT: &str = "Input must be a JSON object";
const MSG_MISSING_WORKFLOW: &str = "Missing 'workflow' parameter";
const MSG_IMAGES_SHAPE: &str = "'images' must be a list of objects with 'name' and 'image' keys";

/// A job as delivered by the hosting platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobEnvelope {
    /// Platform job id, used to derive storage keys.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
}

/// An input image pushed to the engine before submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAsset {
    /// File name the workflow refers to.
    pub name: String,
    /// Base64-encoded file contents.
    pub image: String,
}

impl InputAsset {
    /// Decode the transport encoding into raw bytes. ASCII whitespace is
    /// ignored, so line-wrapped (MIME style) payloads decode as well.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        let compact: Vec<u8> = self
            .image
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        STANDARD.decode(compact)
    }
}

/// A validated job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    /// Engine-specific workflow graph. Never `null`.
    pub workflow: Value,
    /// Input assets in submission order; names are unique.
    pub assets: Vec<InputAsset>,
}

/// Validate raw job input into a [`JobRequest`].
///
/// String input is parsed as JSON first. The `images` shape is checked
/// before `workflow` so a malformed image list is reported even when
/// the workflow is also missing.
pub fn validate_input(input: Option<&Value>) -> Result<JobRequest, JobError> {
    let input = input.ok_or_else(|| invalid(MSG_NO_INPUT))?;

    let parsed;
    let input = match input {
        Value::String(raw) => {
            parsed = serde_json::from_str::<Value>(raw).map_err(|_| invalid(MSG_INVALID_JSON))?;
            &parsed
        }
        other => other,
    };

    let obj = input.as_object().ok_or_else(|| invalid(MSG_NOT_OBJECT))?;

    let assets = match obj.get("images") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => parse_assets(items)?,
        Some(_) => return Err(invalid(MSG_IMAGES_SHAPE)),
    };

    let workflow = match obj.get("workflow") {
        None | Some(Value::Null) => return Err(invalid(MSG_MISSING_WORKFLOW)),
        Some(w) => w.clone(),
    };

    Ok(JobRequest { workflow, assets })
}

fn parse_assets(items: &[Value]) -> Result<Vec<InputAsset>, JobError> {
    let mut seen = HashSet::new();
    let mut assets = Vec::with_capacity(items.len());

    for item in items {
        let name = item.get("name").and_then(Value::as_str);
        let image = item.get("image").and_then(Value::as_str);
        let (Some(name), Some(image)) = (name, image) else {
            return Err(invalid(MSG_IMAGES_SHAPE));
        };

        if !seen.insert(name) {
            return Err(JobError::Validation(format!(
                "Duplicate image name '{name}'"
            )));
        }

        assets.push(InputAsset {
            name: name.to_string(),
            image: image.to_string(),
        });
    }

    Ok(assets)
}

fn invalid(msg: &str) -> JobError {
    JobError::Validation(msg.to_string())
}
