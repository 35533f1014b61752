//! Integration tests for [`ComfyUIApi`] against an in-process mock of
//! the ComfyUI HTTP endpoints.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use comfyrun_comfyui::api::{ComfyUIApi, ComfyUIApiError};
use comfyrun_comfyui::poll::wait_for_outputs;
use comfyrun_core::clock::RecordingSleeper;
use comfyrun_core::error::JobError;

// ---------------------------------------------------------------------------
// Mock engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct UploadedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Clone, Default)]
struct Recorded {
    uploads: Arc<Mutex<Vec<UploadedField>>>,
    prompts: Arc<Mutex<Vec<Value>>>,
}

async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn record_upload(State(rec): State<Recorded>, mut multipart: Multipart) -> StatusCode {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let uploaded = UploadedField {
            name: field.name().unwrap_or_default().to_string(),
            file_name: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
            data: field.bytes().await.unwrap().to_vec(),
        };
        rec.uploads.lock().unwrap().push(uploaded);
    }
    StatusCode::OK
}

async fn record_prompt(State(rec): State<Recorded>, Json(body): Json<Value>) -> Json<Value> {
    rec.prompts.lock().unwrap().push(body);
    Json(json!({ "prompt_id": "p1", "number": 0, "node_errors": {} }))
}

async fn history(Path(prompt_id): Path<String>) -> Json<Value> {
    Json(json!({
        prompt_id: { "outputs": { "9": { "images": [{ "filename": "a.png", "subfolder": "", "type": "output" }] } } }
    }))
}

fn healthy_engine(rec: Recorded) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/upload/image", post(record_upload))
        .route("/prompt", post(record_prompt))
        .route("/history/{prompt_id}", get(history))
        .with_state(rec)
}

fn failing_engine() -> Router {
    Router::new()
        .route("/", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route(
            "/upload/image",
            post(|| async { (StatusCode::BAD_REQUEST, "invalid image") }),
        )
        .route(
            "/prompt",
            post(|| async { (StatusCode::BAD_REQUEST, "prompt has no outputs") }),
        )
        .route(
            "/history/{prompt_id}",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        )
}

// ---------------------------------------------------------------------------
// Availability
// ---------------------------------------------------------------------------

#[tokio::test]
async fn root_200_means_available() {
    let url = spawn(healthy_engine(Recorded::default())).await;
    assert!(ComfyUIApi::new(url).check_available().await);
}

#[tokio::test]
async fn non_200_root_is_not_available() {
    let url = spawn(failing_engine()).await;
    assert!(!ComfyUIApi::new(url).check_available().await);
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_sends_image_part_and_overwrite_flag() {
    let rec = Recorded::default();
    let url = spawn(healthy_engine(rec.clone())).await;

    ComfyUIApi::new(url)
        .upload_image("ref.png", b"\x89PNG".to_vec())
        .await
        .unwrap();

    let uploads = rec.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 2);

    let image = uploads.iter().find(|f| f.name == "image").unwrap();
    assert_eq!(image.file_name.as_deref(), Some("ref.png"));
    assert_eq!(image.content_type.as_deref(), Some("image/png"));
    assert_eq!(image.data, b"\x89PNG");

    let overwrite = uploads.iter().find(|f| f.name == "overwrite").unwrap();
    assert_eq!(overwrite.data, b"true");
}

#[tokio::test]
async fn rejected_upload_carries_status_and_body() {
    let url = spawn(failing_engine()).await;
    let err = ComfyUIApi::new(url)
        .upload_image("ref.png", vec![1, 2, 3])
        .await
        .unwrap_err();
    assert_matches!(err, ComfyUIApiError::ApiError { status: 400, body } if body == "invalid image");
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_wraps_graph_in_prompt_envelope() {
    let rec = Recorded::default();
    let url = spawn(healthy_engine(rec.clone())).await;
    let workflow = json!({ "3": { "class_type": "KSampler", "inputs": { "seed": 7 } } });

    let prompt_id = ComfyUIApi::new(url)
        .submit_workflow(&workflow, "client-1")
        .await
        .unwrap();

    assert_eq!(prompt_id, "p1");
    let prompts = rec.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert_eq!(prompts[0]["prompt"], workflow);
    assert_eq!(prompts[0]["client_id"], "client-1");
}

#[tokio::test]
async fn submit_without_prompt_id_is_an_error() {
    let app = Router::new().route("/prompt", post(|| async { Json(json!({ "number": 1 })) }));
    let url = spawn(app).await;

    let err = ComfyUIApi::new(url)
        .submit_workflow(&json!({}), "client-1")
        .await
        .unwrap_err();
    assert_matches!(err, ComfyUIApiError::MissingField("prompt_id"));
}

#[tokio::test]
async fn rejected_submission_is_an_api_error() {
    let url = spawn(failing_engine()).await;
    let err = ComfyUIApi::new(url)
        .submit_workflow(&json!({}), "client-1")
        .await
        .unwrap_err();
    assert_matches!(err, ComfyUIApiError::ApiError { status: 400, .. });
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_is_returned_as_json() {
    let url = spawn(healthy_engine(Recorded::default())).await;
    let history = ComfyUIApi::new(url).get_history("abc").await.unwrap();
    assert_eq!(history["abc"]["outputs"]["9"]["images"][0]["filename"], "a.png");
}

#[tokio::test]
async fn history_server_error_is_reported() {
    let url = spawn(failing_engine()).await;
    let err = ComfyUIApi::new(url).get_history("abc").await.unwrap_err();
    assert_matches!(err, ComfyUIApiError::ApiError { status: 500, body } if body == "boom");
}

#[tokio::test]
async fn unreachable_engine_is_a_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = ComfyUIApi::new(format!("http://{addr}"))
        .get_history("abc")
        .await
        .unwrap_err();
    assert_matches!(err, ComfyUIApiError::Request(_));
}

#[tokio::test]
async fn hung_history_request_times_out() {
    let app = Router::new().route(
        "/history/{prompt_id}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(json!({}))
        }),
    );
    let url = spawn(app).await;

    let err = ComfyUIApi::new(url)
        .with_request_timeout(Duration::from_millis(100))
        .get_history("abc")
        .await
        .unwrap_err();
    assert_matches!(err, ComfyUIApiError::Request(e) if e.is_timeout());
}

#[tokio::test]
async fn hung_history_ends_polling_with_a_poll_error() {
    let app = Router::new().route(
        "/history/{prompt_id}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(json!({}))
        }),
    );
    let url = spawn(app).await;
    let api = ComfyUIApi::new(url).with_request_timeout(Duration::from_millis(100));
    let clock = RecordingSleeper::new();

    let err = wait_for_outputs(&api, "abc", 5, Duration::from_millis(250), &clock)
        .await
        .unwrap_err();
    assert_matches!(err, JobError::Poll(_));
    assert_eq!(clock.calls(), 0);
}
