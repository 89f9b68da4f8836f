//! API surface tests that need no external tooling: request validation,
//! error shapes and job lookup.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use clipforge_api::{create_router, ApiConfig, AppState};
use clipforge_worker::WorkerConfig;

fn test_state() -> AppState {
    let tmp = std::env::temp_dir().join(format!("clipforge-test-{}", std::process::id()));
    let worker_config = WorkerConfig {
        output_dir: tmp.join("output"),
        temp_dir: tmp.join("temp"),
        ..WorkerConfig::default()
    };
    AppState::new(ApiConfig::default(), worker_config)
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn health_responds_ok() {
    let router = create_router(test_state());
    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cut_rejects_unsupported_url() {
    let router = create_router(test_state());
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/cut",
            serde_json::json!({
                "url": "https://example.com/video.mp4",
                "segments": [{
                    "id": "seg_1", "startS": 0.0, "endS": 30.0, "durationS": 30.0,
                    "avgIntensity": 0.5, "peakIntensity": 0.8, "peakTimeS": 10.0
                }],
                "videoTitle": "t"
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].as_str().unwrap().contains("unsupported URL"));
}

#[tokio::test]
async fn cut_rejects_empty_segments() {
    let router = create_router(test_state());
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/cut",
            serde_json::json!({
                "url": "https://youtube.com/watch?v=dQw4w9WgXcQ",
                "segments": [],
                "videoTitle": "t"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_rejects_oversized_batches() {
    let router = create_router(test_state());
    let urls: Vec<String> = (0..21)
        .map(|i| format!("https://youtube.com/watch?v={:011}", i))
        .collect();
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/batch",
            serde_json::json!({ "urls": urls }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_404() {
    let router = create_router(test_state());
    let response = router
        .oneshot(Request::get("/api/jobs/no-such-job").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_job_progress_stream_is_404() {
    let router = create_router(test_state());
    let response = router
        .oneshot(
            Request::get("/api/jobs/no-such-job/progress")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn analyze_rejects_unsupported_url() {
    let router = create_router(test_state());
    let response = router
        .oneshot(json_request(
            "POST",
            "/api/analyze",
            serde_json::json!({ "url": "ftp://example.com/x" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
