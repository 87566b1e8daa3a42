//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{AppState, CategorySummary, CompletedRecord, Timer, TimerId, TimerPatch};
use super::responses::{ApiError, ApiResponse, BulkResponse, HealthResponse, StatusResponse};

/// Body of POST /timers
#[derive(Debug, Deserialize)]
pub struct NewTimer {
    pub name: String,
    pub duration: u64,
    #[serde(default)]
    pub category: String,
}

/// Body of POST /categories
#[derive(Debug, Deserialize)]
pub struct NewCategory {
    pub name: String,
}

fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match body {
        Ok(Json(body)) => Ok(body),
        Err(rejection) => {
            warn!("Rejected request body: {}", rejection);
            Err(ApiError::UnprocessableBody(rejection.body_text()))
        }
    }
}

fn find_timer(state: &AppState, id: TimerId) -> Result<Timer, ApiError> {
    state
        .store
        .timer(id)
        .ok_or_else(|| ApiError::NotFound(format!("Timer {}", id)))
}

/// Build the response for a single-timer lifecycle action
fn action_response(
    state: &AppState,
    id: TimerId,
    action: &str,
    changed: bool,
) -> Result<Json<ApiResponse>, ApiError> {
    let timer = find_timer(state, id)?;
    let response = if changed {
        ApiResponse::ok(format!("Timer '{}': {}", timer.name, action), Some(timer))
    } else {
        let message = format!(
            "Timer '{}': {} ignored while {}",
            timer.name,
            action,
            timer.status.as_str()
        );
        ApiResponse::ignored(message, Some(timer))
    };
    Ok(Json(response))
}

/// Handle GET /timers
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Timer>> {
    Json(state.store.timers())
}

/// Handle GET /timers/:id
pub async fn get_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<Timer>, ApiError> {
    find_timer(&state, id).map(Json)
}

/// Handle POST /timers - Create a timer in an existing category
pub async fn create_timer_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewTimer>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let body = parse_body(body)?;
    let timer = state.store.add_timer(&body.name, body.duration, &body.category).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(format!("Timer '{}' created", timer.name), Some(timer))),
    ))
}

/// Handle PATCH /timers/:id - Merge a partial update
pub async fn update_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    body: Result<Json<TimerPatch>, JsonRejection>,
) -> Result<Json<ApiResponse>, ApiError> {
    let patch = parse_body(body)?;
    if !state.store.update_timer(id, patch, false).await? {
        return Err(ApiError::NotFound(format!("Timer {}", id)));
    }
    action_response(&state, id, "updated", true)
}

/// Handle DELETE /timers/:id
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<ApiResponse>, ApiError> {
    let timer = find_timer(&state, id)?;
    state.store.delete_timer(id).await;
    Ok(Json(ApiResponse::ok(format!("Timer '{}' deleted", timer.name), None)))
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<ApiResponse>, ApiError> {
    let changed = state.store.start_timer(id).await;
    action_response(&state, id, "start", changed)
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<ApiResponse>, ApiError> {
    let changed = state.store.pause_timer(id).await;
    action_response(&state, id, "pause", changed)
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<ApiResponse>, ApiError> {
    let changed = state.store.reset_timer(id).await;
    action_response(&state, id, "reset", changed)
}

/// Handle POST /timers/:id/complete - Finish a timer early
pub async fn complete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<ApiResponse>, ApiError> {
    let changed = state.store.timer_completed(id).await;
    action_response(&state, id, "complete", changed)
}

/// Handle POST /timers/:id/detach - The timer's view went away
pub async fn detach_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<ApiResponse>, ApiError> {
    find_timer(&state, id)?;
    state.scheduler.detach(id);
    action_response(&state, id, "detach", true)
}

/// Handle POST /timers/:id/attach - The timer's view is shown again
pub async fn attach_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> Result<Json<ApiResponse>, ApiError> {
    find_timer(&state, id)?;
    state.scheduler.attach(id);
    action_response(&state, id, "attach", true)
}

/// Handle GET /categories
pub async fn list_categories_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<CategorySummary>> {
    Json(state.store.categories_overview())
}

/// Handle POST /categories
pub async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewCategory>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let body = parse_body(body)?;
    let name = body.name.trim().to_string();
    if state.store.add_category(&name).await? {
        Ok((
            StatusCode::CREATED,
            Json(ApiResponse::ok(format!("Category '{}' created", name), None)),
        ))
    } else {
        Ok((
            StatusCode::OK,
            Json(ApiResponse::ignored(format!("Category '{}' already exists", name), None)),
        ))
    }
}

/// Handle DELETE /categories/:name - Removes the category and all its timers
pub async fn delete_category_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse>, ApiError> {
    if !state.store.delete_category(&name).await {
        return Err(ApiError::NotFound(format!("Category '{}'", name)));
    }
    info!("Category '{}' deleted via API", name);
    Ok(Json(ApiResponse::ok(format!("Category '{}' deleted", name), None)))
}

/// Handle POST /categories/:name/start
pub async fn start_category_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<BulkResponse> {
    let affected = state.store.start_all_in_category(&name).await;
    Json(BulkResponse::new(name, "start", affected))
}

/// Handle POST /categories/:name/pause
pub async fn pause_category_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<BulkResponse> {
    let affected = state.store.pause_all_in_category(&name).await;
    Json(BulkResponse::new(name, "pause", affected))
}

/// Handle POST /categories/:name/reset
pub async fn reset_category_handler(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Json<BulkResponse> {
    let affected = state.store.reset_all_in_category(&name).await;
    Json(BulkResponse::new(name, "reset", affected))
}

/// Handle GET /history - Most recent completions first
pub async fn history_handler(State(state): State<Arc<AppState>>) -> Json<Vec<CompletedRecord>> {
    Json(state.history.records())
}

/// Handle DELETE /history
pub async fn clear_history_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    state.history.clear().await;
    Json(ApiResponse::ok("History cleared".to_string(), None))
}

/// Handle GET /status - Return current service status
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let timers = state.store.timers();
    Json(StatusResponse {
        timers: timers.len(),
        running: timers.iter().filter(|t| t.is_running()).count(),
        categories: state.store.categories().len(),
        completed: state.history.len(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
    })
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
