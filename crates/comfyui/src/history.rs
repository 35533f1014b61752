//! Helpers for reading `/history/{prompt_id}` documents.
//!
//! ComfyUI answers with `{}` while a prompt is queued or running and
//! with `{"<prompt_id>": {"outputs": {...}, "status": {...}}}` once it
//! has finished.

use serde_json::Value;

/// Return the outputs of `prompt_id` if the history shows it finished
/// with at least one node output.
pub fn completed_outputs<'a>(history: &'a Value, prompt_id: &str) -> Option<&'a Value> {
    let outputs = history.get(prompt_id)?.get("outputs")?;
    let non_empty = match outputs {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    };
    non_empty.then_some(outputs)
}
