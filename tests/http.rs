//! Boundary validation of the HTTP surface.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::json;
use stagger::server::router;
use stagger::{Companion, CompanionConfig};
use tower::util::ServiceExt;

fn app() -> Router {
    router(Companion::new(CompanionConfig::default()))
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_reports_registration_state() {
    let app = app();
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_then_walks_round_trip() {
    let app = app();
    let response = app
        .clone()
        .oneshot(post("/api/sources", json!({ "sources": [100, 200] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(post(
            "/api/walks",
            json!({ "walks": [0u64, 1u64 << 32], "vertices": [101, 201] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn double_registration_conflicts() {
    let app = app();
    let first = app
        .clone()
        .oneshot(post("/api/sources", json!({ "sources": [1] })))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let second = app
        .oneshot(post("/api/sources", json!({ "sources": [2] })))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn walks_before_registration_are_rejected() {
    let app = app();
    let response = app
        .oneshot(post("/api/walks", json!({ "walks": [0u64], "vertices": [5] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn mismatched_batch_arrays_are_rejected() {
    let app = app();
    app.clone()
        .oneshot(post("/api/sources", json!({ "sources": [1] })))
        .await
        .unwrap();
    let response = app
        .oneshot(post(
            "/api/walks",
            json!({ "walks": [0u64, 0u64], "vertices": [5] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_walk_source_is_rejected() {
    let app = app();
    app.clone()
        .oneshot(post("/api/sources", json!({ "sources": [1] })))
        .await
        .unwrap();
    let response = app
        .oneshot(post(
            "/api/walks",
            json!({ "walks": [7u64 << 32], "vertices": [5] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn avoid_unknown_source_is_rejected() {
    let app = app();
    app.clone()
        .oneshot(post("/api/sources", json!({ "sources": [1] })))
        .await
        .unwrap();
    let response = app
        .oneshot(post("/api/sources/3/avoid", json!({ "vertices": [9] })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
