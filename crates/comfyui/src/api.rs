//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (availability check, image upload,
//! workflow submission, history retrieval) using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::engine::RenderEngine;

/// Per-attempt timeout for the availability check. Independent of the
/// probe's overall retry budget.
pub const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Default timeout for upload, submission and history requests. A hung
/// request fails instead of stalling the caller's retry loop.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// MIME type sent for every uploaded input image.
const UPLOAD_MIME: &str = "image/png";

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    request_timeout: Duration,
}

/// Response returned by the ComfyUI `/prompt` endpoint after
/// successfully queuing a workflow.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, timeout, bad body).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response parsed but lacked a required field.
    #[error("ComfyUI response is missing '{0}'")]
    MissingField(&'static str),
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Override the timeout applied to every non-probe request.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Base HTTP URL of this instance.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Send one `GET /` and report whether it returned 200.
    ///
    /// Transport failures (refused connection, timeout) are reported as
    /// "not ready" rather than as errors.
    pub async fn check_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/", self.api_url))
            .timeout(PROBE_REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(e) => {
                tracing::trace!(error = %e, "ComfyUI not reachable yet");
                false
            }
        }
    }

    /// Upload an input image.
    ///
    /// Sends a multipart `POST /upload/image` with the file under the
    /// `image` field and `overwrite=true`, so re-running a job with the
    /// same asset names replaces the previous files.
    pub async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<(), ComfyUIApiError> {
        let part = Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_str(UPLOAD_MIME)?;
        let form = Form::new().part("image", part).text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON and
    /// client ID. Returns the server-assigned `prompt_id`.
    pub async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<String, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        tracing::debug!(queue_number = ?submitted.number, "Workflow accepted by ComfyUI");
        submitted
            .prompt_id
            .filter(|id| !id.is_empty())
            .ok_or(ComfyUIApiError::MissingField("prompt_id"))
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. The returned JSON is
    /// keyed by prompt id and carries the node outputs once execution
    /// has finished.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyUIApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RenderEngine for ComfyUIApi {
    fn base_url(&self) -> &str {
        self.api_url()
    }

    async fn is_available(&self) -> bool {
        self.check_available().await
    }

    async fn upload_image(&self, name: &str, bytes: Vec<u8>) -> Result<(), ComfyUIApiError> {
        ComfyUIApi::upload_image(self, name, bytes).await
    }

    async fn submit_workflow(
        &self,
        workflow: &serde_json::Value,
    ) -> Result<String, ComfyUIApiError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        ComfyUIApi::submit_workflow(self, workflow, &client_id).await
    }

    async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        ComfyUIApi::get_history(self, prompt_id).await
    }
}
