//! Integration tests for the HTTP boundary.
//!
//! Requests go through the full router with `tower::ServiceExt::oneshot`;
//! the last test runs a real listener and reports through `HttpSink`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ingest_core::config::models::{ProgressConfig, PusherConfig};
use ingest_core::ingest::ProgressService;
use ingest_core::pusher::{HttpSink, ProgressPusher};
use ingest_core::store::{keys, MemoryStore};
use ingest_protocol::step_models::{ProgressStatus, Step};
use ingest_server::{router, serve_listener};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower::ServiceExt;

fn test_app() -> (Router, ProgressService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = ProgressService::new(store.clone(), ProgressConfig::default());
    (router(service.clone()), service, store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to call router");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Body should be JSON")
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

#[tokio::test]
async fn test_post_progress_returns_ok() {
    let (app, service, _store) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/ingest/progress",
            json!({
                "runId": "1",
                "currentStep": "embedding",
                "status": "RUNNING",
                "processed": 5,
                "total": 10
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "OK" }));
    let snapshot = service
        .snapshot("1")
        .await
        .expect("Failed to read snapshot")
        .expect("Run should exist");
    assert_eq!(snapshot.current_step, Some(Step::Embedding));
}

#[tokio::test]
async fn test_user_header_substitutes_body_user() {
    let (app, service, _store) = test_app();

    let request = Request::post("/ingest/progress")
        .header("content-type", "application/json")
        .header("x-user-uuid", "header-user")
        .body(Body::from(
            json!({ "runId": "2", "currentStep": "UPLOAD", "status": "RUNNING" }).to_string(),
        ))
        .expect("Failed to build request");
    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    let snapshot = service
        .snapshot("2")
        .await
        .expect("Failed to read snapshot")
        .expect("Run should exist");
    assert_eq!(snapshot.user_id.as_deref(), Some("header-user"));
}

#[tokio::test]
async fn test_bogus_step_is_rejected_with_envelope() {
    let (app, _service, store) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/ingest/progress",
            json!({ "runId": "3", "currentStep": "BOGUS" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["isSuccess"], false);
    assert_eq!(store.stream_len(&keys::run_events("3")).await, 0);
    assert_eq!(store.stream_len(keys::GLOBAL_PROGRESS).await, 0);
}

#[tokio::test]
async fn test_missing_run_id_is_rejected() {
    let (app, _service, _store) = test_app();

    let (status, body) = send(
        &app,
        post_json("/ingest/progress", json!({ "currentStep": "UPLOAD" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .expect("message should be a string")
        .contains("runId"));
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let (app, _service, _store) = test_app();

    let request = Request::post("/ingest/progress")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("Failed to build request");
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_register_then_poll_run() {
    let (app, _service, _store) = test_app();

    let (status, body) = send(
        &app,
        post_json(
            "/ingest/runs",
            json!({ "userId": "u-1", "fileNo": "file-1", "fileName": "a.pdf" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let run_id = body["runId"].as_str().expect("runId").to_string();

    let (status, body) = send(&app, get(&format!("/ingest/runs/{run_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "PENDING");
    assert_eq!(body["currentStep"], "UPLOAD");
    assert_eq!(body["fileName"], "a.pdf");

    let (status, body) = send(&app, get("/ingest/users/u-1/runs")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runIds"], json!([run_id]));
}

#[tokio::test]
async fn test_register_takes_user_from_header() {
    let (app, service, _store) = test_app();

    let request = Request::post("/ingest/runs")
        .header("content-type", "application/json")
        .header("x-user-uuid", "header-user")
        .body(Body::from(json!({ "fileNo": "file-2" }).to_string()))
        .expect("Failed to build request");
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::CREATED);
    let run_id = body["runId"].as_str().expect("runId").to_string();

    let snapshot = service
        .snapshot(&run_id)
        .await
        .expect("Failed to read snapshot")
        .expect("snapshot missing");
    assert_eq!(snapshot.user_id.as_deref(), Some("header-user"));
    assert_eq!(
        service
            .active_runs("header-user")
            .await
            .expect("Failed to list runs"),
        vec![run_id]
    );
}

#[tokio::test]
async fn test_register_without_any_user_is_rejected() {
    let (app, _service, _store) = test_app();

    let (status, body) = send(&app, post_json("/ingest/runs", json!({ "fileNo": "file-2" }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_run_is_not_found() {
    let (app, _service, _store) = test_app();

    let (status, body) = send(&app, get("/ingest/runs/404")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_events_are_paged_after_an_id() {
    let (app, _service, _store) = test_app();
    for processed in 1..=3 {
        let (status, _) = send(
            &app,
            post_json(
                "/ingest/progress",
                json!({
                    "runId": "9",
                    "currentStep": "CHUNKING",
                    "status": "RUNNING",
                    "processed": processed,
                    "total": 3
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, get("/ingest/runs/9/events?count=2")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 2);
    let last_id = entries[1]["id"].as_str().expect("id").to_string();

    let (status, body) = send(&app, get(&format!("/ingest/runs/9/events?after={last_id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["fields"]["processed"], "3");

    let (status, _) = send(&app, get("/ingest/runs/9/events?after=garbage")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_http_pusher_reports_to_running_server() {
    let store = Arc::new(MemoryStore::new());
    let service = ProgressService::new(store.clone(), ProgressConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to read address");
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve_listener(listener, service.clone(), async move {
        let _ = stop_rx.await;
    }));

    let config = PusherConfig {
        endpoint: format!("http://{addr}/ingest/progress"),
        ..PusherConfig::default()
    };
    let sink = Arc::new(HttpSink::new(&config).expect("Failed to build HTTP sink"));
    let (pusher, worker) =
        ProgressPusher::spawn(&config, sink, Some("u-7"), Some("file-7"), Step::Upload);
    let mut pusher = pusher.with_run_id("70");

    pusher.start(Some(2));
    pusher.complete(None, None);
    let mut failing = pusher.with_step(Step::Extraction);
    failing.fail(Some(0), Some(5));
    drop(pusher);
    drop(failing);
    let stats = worker.join().await;

    assert_eq!(stats.sent, 3);
    assert_eq!(stats.failed, 0);
    let snapshot = service
        .snapshot("70")
        .await
        .expect("Failed to read snapshot")
        .expect("Run should exist");
    assert_eq!(snapshot.status, ProgressStatus::Failed);
    assert_eq!(snapshot.user_id.as_deref(), Some("u-7"));

    let _ = stop_tx.send(());
    server
        .await
        .expect("Server task panicked")
        .expect("Server failed");
}
