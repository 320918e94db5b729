use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use llmxt::config::Config;
use llmxt::jobs::JobManager;
use llmxt::{build_app, AppState};
use serde_json::json;

fn create_test_config() -> Config {
    Config {
        port: 8080,
        use_object_storage: false,
        storage_endpoint: String::new(),
        storage_access_key: String::new(),
        storage_secret_key: String::new(),
        storage_bucket: "test".to_string(),
        storage_region: "auto".to_string(),
        default_user_agent: "test-agent/1.0".to_string(),
        max_concurrent_jobs: 1,
        max_concurrent_fetches: 1,
        snapshot_every_pages: 10,
        summarizer_api_key: None,
    }
}

fn test_server() -> TestServer {
    let config = Arc::new(create_test_config());
    let job_manager = Arc::new(JobManager::new((*config).clone(), None));
    let state = AppState {
        config: config.clone(),
        job_manager,
    };
    let app = build_app(state);
    TestServer::new(app).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let server = test_server();
    let response = server.get("/health").await;
    response.assert_status(StatusCode::OK);
    let body = response.json::<serde_json::Value>();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_and_check_generation_status() {
    let server = test_server();

    let payload = json!({
        "url": "https://example.com",
        "max_pages": 1,
        "max_depth": 1,
        "respect_robots": false
    });

    let create_response = server.post("/v1/generations").json(&payload).await;
    create_response.assert_status(StatusCode::ACCEPTED);
    let created = create_response.json::<serde_json::Value>();
    let job_id = created["job_id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "pending");

    let status_response = server.get(&format!("/v1/generations/{job_id}")).await;
    status_response.assert_status(StatusCode::OK);
    let status = status_response.json::<serde_json::Value>();
    assert_eq!(status["job_id"], job_id);
    let status_str = status["status"].as_str().unwrap();
    assert!(["pending", "running", "completed", "failed"].contains(&status_str));
}

#[tokio::test]
async fn create_rejects_invalid_url() {
    let server = test_server();
    let payload = json!({ "url": "not-a-url" });
    let response = server.post("/v1/generations").json(&payload).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_for_unknown_job_is_404() {
    let server = test_server();
    let response = server.get("/v1/generations/does-not-exist").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn download_rejects_unknown_file_type() {
    let server = test_server();
    let payload = json!({ "url": "https://example.com", "respect_robots": false });
    let created = server.post("/v1/generations").json(&payload).await;
    let job_id = created.json::<serde_json::Value>()["job_id"].as_str().unwrap().to_string();

    let response = server
        .get(&format!("/v1/generations/{job_id}/download/not-a-real-file"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let server = test_server();
    let payload = json!({ "url": "https://example.com", "respect_robots": false });
    let created = server.post("/v1/generations").json(&payload).await;
    let job_id = created.json::<serde_json::Value>()["job_id"].as_str().unwrap().to_string();

    let first = server.delete(&format!("/v1/generations/{job_id}")).await;
    first.assert_status(StatusCode::OK);
    assert_eq!(first.json::<serde_json::Value>()["status"], "cancelled");

    let second = server.delete(&format!("/v1/generations/{job_id}")).await;
    second.assert_status(StatusCode::OK);
    assert_eq!(second.json::<serde_json::Value>()["status"], "not_cancellable");
}

#[tokio::test]
async fn cancel_unknown_job_is_404() {
    let server = test_server();
    let response = server.delete("/v1/generations/does-not-exist").await;
    response.assert_status(StatusCode::NOT_FOUND);
}
