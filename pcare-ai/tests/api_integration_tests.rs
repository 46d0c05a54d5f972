//! Integration tests for pcare-ai API endpoints
//!
//! Router driven with `oneshot`; capabilities are scripted (see `helpers`).

mod helpers;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use helpers::{wait_for_status, TestPipeline};
use http_body_util::BodyExt;
use pcare_ai::models::SessionStatus;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tower::util::ServiceExt;
use uuid::Uuid;

/// Test helper: create test app with in-memory database and scripted providers
async fn create_test_app() -> (Router, SqlitePool, pcare_ai::AppState) {
    let harness = TestPipeline::default().build().await;
    let state = pcare_ai::AppState::new(harness.db.clone(), harness.orchestrator);
    let app = pcare_ai::build_router(state.clone());
    (app, harness.db, state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool, state) = create_test_app().await;

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["module"], "pcare-ai");
    assert!(json["uptime_seconds"].is_u64());
    assert!(json.get("last_error").is_none());

    *state.last_error.write().await = Some("All identification providers failed".to_string());
    let (_, json) = send(&app, get("/health")).await;
    assert_eq!(json["last_error"], "All identification providers failed");
}

#[tokio::test]
async fn test_session_lifecycle_over_http() {
    let (app, pool, _state) = create_test_app().await;

    let (status, json) = send(
        &app,
        post_json("/sessions", json!({ "image_url": "https://img.example/snake.jpg" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "uploading");
    let session_id: Uuid = json["session_id"].as_str().unwrap().parse().unwrap();

    wait_for_status(&pool, session_id, SessionStatus::Confirming).await;

    let (status, json) = send(&app, get(&format!("/sessions/{}", session_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "confirming");
    assert_eq!(json["identified_species"], "Snake Plant");
    assert_eq!(json["care_profile"]["watering_days"], 8);
    assert_eq!(json["care_profile"]["sunlight_level"], "low");
    assert_eq!(json["care_sources"].as_array().unwrap().len(), 3);

    let (status, json) = send(&app, post_empty(&format!("/sessions/{}/confirm", session_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "completed");
    let plant_id = json["plant_id"].as_str().unwrap().to_string();

    let (status, json) = send(&app, get(&format!("/plants/{}", plant_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["common_name"], "Snake Plant");
    assert_eq!(json["fertilizing_days"], 35);

    let (status, json) = send(&app, get("/plants")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    // Confirming twice is a state conflict
    let (status, json) = send(&app, post_empty(&format!("/sessions/{}/confirm", session_id))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_create_session_requires_image_url() {
    let (app, _pool, _state) = create_test_app().await;

    let (status, json) = send(&app, post_json("/sessions", json!({ "image_url": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (app, _pool, _state) = create_test_app().await;
    let missing = Uuid::new_v4();

    let (status, json) = send(&app, get(&format!("/sessions/{}", missing))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["code"], "NOT_FOUND");

    let (status, _) = send(&app, post_empty(&format!("/sessions/{}/confirm", missing))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, delete(&format!("/sessions/{}", missing))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, get(&format!("/plants/{}", missing))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_select_outside_needs_selection_is_conflict() {
    let (app, _pool, state) = create_test_app().await;
    let session = state
        .orchestrator
        .create("https://img.example/snake.jpg")
        .await
        .unwrap();

    let (status, json) = send(
        &app,
        post_json(
            &format!("/sessions/{}/select", session.session_id),
            json!({ "common_name": "Snake Plant", "scientific_name": "Dracaena trifasciata" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("uploading"));
}

#[tokio::test]
async fn test_select_requires_names() {
    let (app, _pool, _state) = create_test_app().await;

    let (status, _) = send(
        &app,
        post_json(
            &format!("/sessions/{}/select", Uuid::new_v4()),
            json!({ "common_name": "", "scientific_name": "Dracaena trifasciata" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_session() {
    let (app, _pool, state) = create_test_app().await;
    let session = state
        .orchestrator
        .create("https://img.example/snake.jpg")
        .await
        .unwrap();
    let uri = format!("/sessions/{}", session.session_id);

    let (status, _) = send(&app, delete(&uri)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_sessions() {
    let (app, _pool, state) = create_test_app().await;
    for _ in 0..3 {
        state
            .orchestrator
            .create("https://img.example/snake.jpg")
            .await
            .unwrap();
    }

    let (status, json) = send(&app, get("/sessions?limit=2")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 2);
}
