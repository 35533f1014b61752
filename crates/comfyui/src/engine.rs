//! The render engine seam.
//!
//! Every pipeline stage talks to the engine through [`RenderEngine`] so
//! the stages can be driven by a scripted engine in tests.
//! [`ComfyUIApi`](crate::api::ComfyUIApi) is the HTTP implementation.

use async_trait::async_trait;

use crate::api::ComfyUIApiError;

#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Base URL, used in log lines and error messages.
    fn base_url(&self) -> &str;

    /// One availability attempt. Never fails; `false` means not ready.
    async fn is_available(&self) -> bool;

    /// Push one input image, overwriting any file with the same name.
    async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<(), ComfyUIApiError>;

    /// Queue a workflow graph and return its correlation id.
    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<String, ComfyUIApiError>;

    /// Fetch the history document for a correlation id.
    async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError>;
}

