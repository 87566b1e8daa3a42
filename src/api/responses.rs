//! API response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::state::Timer;

/// Response for timer and category actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer: Option<Timer>,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: String, timer: Option<Timer>) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            timer,
        }
    }

    /// The action changed state
    pub fn ok(message: String, timer: Option<Timer>) -> Self {
        Self::new("ok", message, timer)
    }

    /// The action did not apply in the current state and was ignored
    pub fn ignored(message: String, timer: Option<Timer>) -> Self {
        Self::new("ignored", message, timer)
    }

    /// Create an error response
    pub fn error(message: String) -> Self {
        Self::new("error", message, None)
    }
}

/// Result of a bulk category action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkResponse {
    pub category: String,
    pub action: String,
    pub affected: usize,
    pub timestamp: DateTime<Utc>,
}

impl BulkResponse {
    pub fn new(category: String, action: &str, affected: usize) -> Self {
        Self {
            category,
            action: action.to_string(),
            affected,
            timestamp: Utc::now(),
        }
    }
}

/// Service status with store counters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub timers: usize,
    pub running: usize,
    pub categories: usize,
    pub completed: usize,
    pub uptime: String,
    pub port: u16,
    pub host: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Failures surfaced to HTTP clients
#[derive(Debug)]
pub enum ApiError {
    /// Input rejected; the message explains why
    Validation(ValidationError),
    NotFound(String),
    /// Body missing, not JSON, or not the expected shape
    UnprocessableBody(String),
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            ApiError::UnprocessableBody(message) => (StatusCode::UNPROCESSABLE_ENTITY, message),
        };
        (status, Json(ApiResponse::error(message))).into_response()
    }
}
