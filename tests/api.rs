use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use timer_keeper::{create_router, storage::MemoryStore, AppState};

async fn app() -> (Router, Arc<AppState>) {
    let state = Arc::new(
        AppState::start(Arc::new(MemoryStore::new()), false, 20554, "127.0.0.1".to_string()).await,
    );
    (create_router(Arc::clone(&state)), state)
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn it_should_create_a_timer_in_an_existing_category() {
    let (app, _state) = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/timers",
        Some(json!({ "name": "Read", "duration": 5, "category": "Study" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["timer"]["status"], "NotStarted");
    assert_eq!(body["timer"]["elapsed"], 0);

    let (status, timers) = send(&app, "GET", "/timers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(timers.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn it_should_explain_validation_failures() {
    let (app, state) = app().await;

    let (status, body) = send(
        &app,
        "POST",
        "/timers",
        Some(json!({ "name": "Read", "duration": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "A category must be selected");

    let (status, body) = send(
        &app,
        "POST",
        "/timers",
        Some(json!({ "name": "", "duration": 5, "category": "Study" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "Timer name must not be empty");

    let (status, _) = send(&app, "POST", "/timers", Some(json!("not a timer"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(state.store.timers().is_empty());
}

#[tokio::test]
async fn it_should_reject_unreadable_bodies_with_an_error_response() {
    let (app, state) = app().await;

    let malformed = Request::builder()
        .method("POST")
        .uri("/timers")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\": \"Read\","))
        .unwrap();
    let missing_content_type = Request::builder()
        .method("POST")
        .uri("/categories")
        .body(Body::from(r#"{"name": "Cooking"}"#))
        .unwrap();

    for request in [malformed, missing_content_type] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert!(!body["message"].as_str().unwrap().is_empty());
    }

    assert!(state.store.timers().is_empty());
    assert!(!state.store.categories().contains(&"Cooking".to_string()));
}

#[tokio::test]
async fn it_should_report_ignored_transitions() {
    let (app, state) = app().await;
    let timer = state.store.add_timer("Read", 5, "Study").await.unwrap();

    let (status, body) = send(&app, "POST", &format!("/timers/{}/pause", timer.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    let (_, body) = send(&app, "POST", &format!("/timers/{}/start", timer.id), None).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["timer"]["status"], "Running");

    let (_, body) = send(&app, "POST", &format!("/timers/{}/start", timer.id), None).await;
    assert_eq!(body["status"], "ignored");
    state.shutdown().await;
}

#[tokio::test]
async fn it_should_return_404_for_unknown_timers() {
    let (app, _state) = app().await;
    let id = uuid::Uuid::new_v4();

    let (status, _) = send(&app, "POST", &format!("/timers/{}/start", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "DELETE", &format!("/timers/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn it_should_cascade_category_deletion() {
    let (app, state) = app().await;
    state.store.add_timer("Read", 5, "Study").await.unwrap();
    let squats = state.store.add_timer("Squats", 30, "Workout").await.unwrap();

    let (status, _) = send(&app, "DELETE", "/categories/Study", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, timers) = send(&app, "GET", "/timers", None).await;
    let ids: Vec<_> = timers.as_array().unwrap().iter().map(|t| t["id"].clone()).collect();
    assert_eq!(ids, vec![json!(squats.id)]);

    let (status, _) = send(&app, "DELETE", "/categories/Study", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn it_should_create_categories_idempotently() {
    let (app, _state) = app().await;

    let (status, _) = send(&app, "POST", "/categories", Some(json!({ "name": "Cooking" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = send(&app, "POST", "/categories", Some(json!({ "name": "Cooking" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");

    let (_, categories) = send(&app, "GET", "/categories", None).await;
    let names: Vec<_> = categories
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["Workout", "Study", "Break", "Cooking"]);
}

#[tokio::test]
async fn it_should_run_bulk_actions_and_clear_history() {
    let (app, state) = app().await;
    let plank = state.store.add_timer("Plank", 60, "Workout").await.unwrap();
    state.store.add_timer("Squats", 30, "Workout").await.unwrap();

    let (_, body) = send(&app, "POST", "/categories/Workout/start", None).await;
    assert_eq!(body["affected"], 2);
    let (_, body) = send(&app, "POST", "/categories/Workout/pause", None).await;
    assert_eq!(body["affected"], 2);

    let (_, body) = send(&app, "POST", &format!("/timers/{}/complete", plank.id), None).await;
    assert_eq!(body["timer"]["status"], "Completed");

    let (_, history) = send(&app, "GET", "/history", None).await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["name"], "Plank");
    assert!(history[0].get("completedAt").is_some());

    let (_, status) = send(&app, "GET", "/status", None).await;
    assert_eq!(status["completed"], 1);

    send(&app, "DELETE", "/history", None).await;
    let (_, history) = send(&app, "GET", "/history", None).await;
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn it_should_report_health() {
    let (app, _state) = app().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
