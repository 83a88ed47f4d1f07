use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use promptsmith_cli::server::{build_router, ServeState};
use promptsmith_cli::{HistoryClient, HistoryStore};
use promptsmith_core_types::{Task, TaskStatus};
use promptsmith_scheduler::ResultSink;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tower::ServiceExt;

fn store() -> (TempDir, Arc<HistoryStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(HistoryStore::new(dir.path().join("history.jsonl")));
    (dir, store)
}

async fn send(router: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_then_list_newest_first() {
    let (_dir, store) = store();
    let router = build_router(ServeState::new(store));

    for text in ["first", "second"] {
        let body = json!({ "originalText": text, "imageUrl": format!("https://img.test/{text}.png") });
        let (status, created) = send(router.clone(), post("/tasks", &body.to_string())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["originalText"], text);
        assert_eq!(created["data"]["status"], "pending");
        assert!(created["data"]["id"].is_string());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let (status, listed) = send(router, get("/api/tasks")).await;
    assert_eq!(status, StatusCode::OK);
    let data = listed["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["originalText"], "second");
    assert_eq!(data[1]["stage2Result"], "https://img.test/first.png");
}

#[tokio::test]
async fn missing_original_text_is_rejected() {
    let (_dir, store) = store();
    let router = build_router(ServeState::new(store.clone()));

    let (status, body) = send(router, post("/tasks", r#"{"imageUrl": "x"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Please provide the original text" }));
    assert!(store.latest(50).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let (_dir, store) = store();
    let router = build_router(ServeState::new(store));

    let (status, body) = send(router.clone(), post("/tasks", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().len() > 0);

    let (status, body) = send(router, post("/tasks", r#"{"originalText": "x", "status": "later"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("later"));
}

#[tokio::test]
async fn listing_is_capped_at_fifty() {
    let (_dir, store) = store();
    let router = build_router(ServeState::new(store));
    for idx in 0..55 {
        let body = json!({ "originalText": format!("t{idx}") }).to_string();
        let (status, _) = send(router.clone(), post("/tasks", &body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, listed) = send(router, get("/tasks")).await;
    assert_eq!(listed["data"].as_array().unwrap().len(), 50);
}

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, store) = store();
    let (status, body) = send(build_router(ServeState::new(store)), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_records_finished_tasks_over_http() {
    let (_dir, store) = store();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = build_router(ServeState::new(store.clone()));
    let server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });

    let client = HistoryClient::new(&format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    let mut task = Task::new("a quiet harbor");
    task.stage1_result = "a quiet harbor at dawn, oil painting".into();
    task.stage2_result = "https://img.test/harbor.png".into();
    task.status = TaskStatus::Completed;
    client.record(&task).await.unwrap();

    let latest = client.latest().await.unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].original_text, "a quiet harbor");
    assert_eq!(latest[0].status, TaskStatus::Completed);
    assert_eq!(latest[0].stage2_result.as_deref(), Some("https://img.test/harbor.png"));

    server.abort();
}

#[tokio::test]
async fn client_surfaces_unreachable_service() {
    let client = HistoryClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    let err = client.record(&Task::new("x")).await.unwrap_err();
    assert_eq!(err.kind(), "channel");
}
