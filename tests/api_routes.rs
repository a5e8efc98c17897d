//! HTTP route tests
//!
//! Drive the axum router in-process with `tower::ServiceExt::oneshot`. Only
//! the shutdown test opens a real socket. Each test writes its own processed
//! table to a temporary directory.
//!
//! Run with: cargo test --test api_routes

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use coastal_threat_service::api::{router, serve, AppState, SharedState};
use coastal_threat_service::config::{ScoringConfig, ServiceConfig};
use coastal_threat_service::replay::ReplayOptions;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tower::ServiceExt;

const TABLE: &str = "\
measurement_timestamp,air_temperature,humidity,rain_intensity,wind_speed,maximum_wind_speed,barometric_pressure
2025-08-30T10:00:00,27.9,70,0.0,6.1,9.0,1008.2
2025-08-30T11:00:00,28.1,82,1.5,14.0,20.5,1001.0
2025-08-30T12:00:00,28.5,80,3.0,18.0,22.0,995.0
";

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn app(table: Option<&str>) -> (Router, TempDir) {
    let (state, dir) = shared_state(table, false);
    (router(state), dir)
}

fn shared_state(table: Option<&str>, looping: bool) -> (SharedState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let data_path = dir.path().join("cleaned_weather.csv");
    if let Some(text) = table {
        std::fs::write(&data_path, text).unwrap();
    }
    let service = ServiceConfig {
        data_path,
        location_id: "TESTBEACH".to_string(),
        stream_interval: Duration::from_millis(10),
        replay: ReplayOptions {
            looping,
            ..Default::default()
        },
        ..Default::default()
    };
    let state = AppState::new(Arc::new(ScoringConfig::builtin()), service);
    (Arc::new(state), dir)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// /health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health() {
    let (app, _dir) = app(None);
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({ "status": "ok" }));
}

// ---------------------------------------------------------------------------
// /threat/latest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_latest_scores_last_row() {
    let (app, _dir) = app(Some(TABLE));
    let response = app.oneshot(get("/threat/latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["location_id"], "TESTBEACH_MAIN");
    assert_eq!(json["score"], 31.67);
    assert_eq!(json["level"], "Caution");
    assert_eq!(json["raw"]["wind_speed"], 18.0);
    assert_eq!(json["raw"]["measurement_timestamp"], "2025-08-30T12:00:00");
    assert!(json["timestamp"].is_string(), "response carries a production timestamp");
}

#[tokio::test]
async fn test_latest_without_dataset_is_unavailable() {
    let (app, _dir) = app(None);
    let response = app.oneshot(get("/threat/latest")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "data_unavailable");
}

// ---------------------------------------------------------------------------
// /threat/score
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_score_custom_reading() {
    let (app, _dir) = app(None);
    let body = r#"{"wind_speed":18,"maximum_wind_speed":22,"humidity":80,"rain_intensity":3,"barometric_pressure":995}"#;
    let response = app.oneshot(post_json("/threat/score", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["location_id"], "CUSTOM_INPUT");
    assert_eq!(json["score"], 31.67);
    assert_eq!(json["parameters"]["wind_speed"], 1);
    assert_eq!(json["parameters"]["humidity"], 0);
}

#[tokio::test]
async fn test_score_empty_object_is_safe() {
    let (app, _dir) = app(None);
    let response = app.oneshot(post_json("/threat/score", "{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["score"], 0.0);
    assert_eq!(json["level"], "Safe");
}

#[tokio::test]
async fn test_score_rejects_malformed_json() {
    let (app, _dir) = app(None);
    let response = app
        .oneshot(post_json("/threat/score", "{\"wind_speed\": "))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["error"], "malformed_reading");
}

#[tokio::test]
async fn test_score_rejects_wrong_field_type() {
    let (app, _dir) = app(None);
    let response = app
        .oneshot(post_json("/threat/score", r#"{"wind_speed":"gale"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ---------------------------------------------------------------------------
// /threat/stream
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stream_emits_one_event_per_row() {
    let (app, _dir) = app(Some(TABLE));
    let response = app.oneshot(get("/threat/stream")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream",
        "stream must be served as SSE"
    );

    // The default replay does not loop, so the body ends after the last row.
    let body = tokio::time::timeout(
        Duration::from_secs(5),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("stream should end once the table is exhausted")
    .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    let events: Vec<serde_json::Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e["location_id"] == "TESTBEACH_STREAM"));
    assert_eq!(events[0]["raw"]["wind_speed"], 6.1);
    assert_eq!(events[2]["score"], 31.67);
}

#[tokio::test]
async fn test_stream_without_dataset_is_unavailable() {
    let (app, _dir) = app(None);
    let response = app.oneshot(get("/threat/stream")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let (app, _dir) = app(None);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/threat/score")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
}

#[tokio::test]
async fn test_cors_rejects_unlisted_origin() {
    let (app, _dir) = app(None);
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/threat/score")
        .header(header::ORIGIN, "http://evil.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_graceful_shutdown_closes_open_streams() {
    let (state, _dir) = shared_state(Some(TABLE), true);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (trigger, stop) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, state, async move {
        let _ = stop.await;
    }));

    let mut client = TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /threat/stream HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    // Wait until the looping feed is actually emitting.
    let mut received = Vec::new();
    let mut buf = [0u8; 1024];
    while !String::from_utf8_lossy(&received).contains("data:") {
        let n = client.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before the first event");
        received.extend_from_slice(&buf[..n]);
    }
    assert!(String::from_utf8_lossy(&received).starts_with("HTTP/1.1 200"));

    trigger.send(()).unwrap();

    let finished = tokio::time::timeout(Duration::from_secs(5), server).await;
    assert!(finished.is_ok(), "server kept running with an open SSE stream");
    assert!(finished.unwrap().unwrap().is_ok());

    // The client sees the stream end rather than a hung connection.
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while client.read(&mut buf).await.unwrap_or(0) > 0 {}
    })
    .await;
    assert!(drained.is_ok(), "client connection was not closed");
}
