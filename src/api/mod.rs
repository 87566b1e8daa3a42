//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/timers", get(list_timers_handler).post(create_timer_handler))
        .route("/timers/:id", get(get_timer_handler).patch(update_timer_handler).delete(delete_timer_handler))
        .route("/timers/:id/start", post(start_timer_handler))
        .route("/timers/:id/pause", post(pause_timer_handler))
        .route("/timers/:id/reset", post(reset_timer_handler))
        .route("/timers/:id/complete", post(complete_timer_handler))
        .route("/timers/:id/detach", post(detach_timer_handler))
        .route("/timers/:id/attach", post(attach_timer_handler))
        .route("/categories", get(list_categories_handler).post(create_category_handler))
        .route("/categories/:name", axum::routing::delete(delete_category_handler))
        .route("/categories/:name/start", post(start_category_handler))
        .route("/categories/:name/pause", post(pause_category_handler))
        .route("/categories/:name/reset", post(reset_category_handler))
        .route("/history", get(history_handler).delete(clear_history_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
