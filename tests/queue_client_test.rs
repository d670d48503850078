//! Tests for the remote job-queue client: submission envelope, bearer
//! auth, bounded polling, and terminal-state handling.

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use pipeline_relay::models::job::JobRequest;
use pipeline_relay::services::queue::{QueueClient, QueueError};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct QueueStub {
    submits: Arc<Mutex<Vec<(Option<String>, Value)>>>,
    polls: Arc<AtomicUsize>,
    statuses: Arc<Mutex<Vec<Value>>>,
    cancels: Arc<AtomicUsize>,
}

async fn run_handler(
    State(stub): State<QueueStub>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    stub.submits.lock().unwrap().push((auth, body));
    Json(json!({"id": "job-1", "status": "IN_QUEUE"}))
}

async fn status_handler(
    State(stub): State<QueueStub>,
    Path((_endpoint, _job_id)): Path<(String, String)>,
) -> Json<Value> {
    let index = stub.polls.fetch_add(1, Ordering::SeqCst);
    let statuses = stub.statuses.lock().unwrap();
    let clamped = index.min(statuses.len() - 1);
    Json(statuses[clamped].clone())
}

async fn cancel_handler(
    State(stub): State<QueueStub>,
    Path((_endpoint, _job_id)): Path<(String, String)>,
) -> Json<Value> {
    stub.cancels.fetch_add(1, Ordering::SeqCst);
    Json(json!({"id": "job-1", "status": "CANCELLED"}))
}

async fn start_queue_stub(statuses: Vec<Value>) -> (String, QueueStub) {
    let stub = QueueStub {
        statuses: Arc::new(Mutex::new(statuses)),
        ..QueueStub::default()
    };
    let app = Router::new()
        .route("/v2/{endpoint}/run", post(run_handler))
        .route("/v2/{endpoint}/status/{job_id}", get(status_handler))
        .route("/v2/{endpoint}/cancel/{job_id}", post(cancel_handler))
        .with_state(stub.clone());

    let addr = helpers::serve(app).await;
    (format!("http://{addr}"), stub)
}

fn fast_client(base: String) -> QueueClient {
    QueueClient::new(base, "secret-key", "conv-endpoint")
        .with_poll_interval(Duration::from_millis(10))
}

#[tokio::test]
async fn submit_wraps_the_request_and_authenticates() {
    let (base, stub) = start_queue_stub(Vec::new()).await;
    let client = fast_client(base);

    let request = JobRequest {
        input_url: Some("http://x/a.json".to_string()),
        ..JobRequest::default()
    };
    let job = client.submit(&request).await.expect("submit succeeds");

    assert_eq!(job.id, "job-1");
    assert_eq!(job.status.as_deref(), Some("IN_QUEUE"));

    let submits = stub.submits.lock().unwrap();
    let (auth, body) = &submits[0];
    assert_eq!(auth.as_deref(), Some("Bearer secret-key"));
    assert_eq!(body["input"]["inputUrl"], "http://x/a.json");
    assert_eq!(body["input"]["email"], "unknown@example.com");
}

#[tokio::test]
async fn polling_returns_output_on_completion() {
    let (base, stub) = start_queue_stub(vec![
        json!({"status": "IN_QUEUE"}),
        json!({"status": "IN_PROGRESS"}),
        json!({"status": "COMPLETED", "output": {"bundle_size": 42}}),
    ])
    .await;
    let client = fast_client(base);

    let output = client
        .wait_for_completion("job-1")
        .await
        .expect("job completes");

    assert_eq!(output["bundle_size"], 42);
    assert_eq!(stub.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn polling_surfaces_remote_failure() {
    let (base, _stub) = start_queue_stub(vec![
        json!({"status": "FAILED", "error": "gpu fell over"}),
    ])
    .await;
    let client = fast_client(base);

    let error = client
        .wait_for_completion("job-1")
        .await
        .expect_err("job fails");

    match &error {
        QueueError::JobFailed(message) => assert_eq!(message, "gpu fell over"),
        other => panic!("expected JobFailed, got {other:?}"),
    }
    assert_eq!(error.to_string(), "Job failed: gpu fell over");
}

#[tokio::test]
async fn polling_is_bounded_on_stuck_jobs() {
    let (base, stub) = start_queue_stub(vec![json!({"status": "IN_PROGRESS"})]).await;
    let client = fast_client(base).with_max_poll_attempts(3);

    let error = client
        .wait_for_completion("job-1")
        .await
        .expect_err("polling gives up");

    assert!(matches!(error, QueueError::DeadlineExceeded(3)));
    assert_eq!(stub.polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn cancel_posts_to_the_cancel_endpoint() {
    let (base, stub) = start_queue_stub(Vec::new()).await;
    let client = fast_client(base);

    client.cancel("job-1").await.expect("cancel succeeds");
    assert_eq!(stub.cancels.load(Ordering::SeqCst), 1);
}
