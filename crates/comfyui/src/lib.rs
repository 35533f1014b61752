//! ComfyUI REST client and job-lifecycle stages.
//!
//! Provides the HTTP API wrapper, the [`engine::RenderEngine`] seam,
//! and the stages that talk to the engine: availability probing, input
//! image upload, and completion polling.

pub mod api;
pub mod engine;
pub mod history;
pub mod poll;
pub mod probe;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod upload;
