//! Common error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Standard API error response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// ISO 8601 timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        let status = match self.code.as_str() {
            "INVALID_INPUT" => StatusCode::BAD_REQUEST,
            "INVALID_STATE" => StatusCode::UNPROCESSABLE_ENTITY,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "STORE_UNAVAILABLE" => StatusCode::SERVICE_UNAVAILABLE,
            "UPSTREAM_UNAVAILABLE" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

/// Errors surfaced by scheduler operations.
#[derive(Debug, Error)]
pub enum KitchenError {
    /// Validation failure: empty ids, out-of-range numerics, empty item
    /// lists, unsupported enum values.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A guarded transition violated the entity state machine.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Unknown id on read or update.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate id on create, or the queue already contains the order.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient backing-store I/O failure; safe to retry.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Transient outbound-bridge failure after retries were exhausted.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
}

impl KitchenError {
    pub fn code(&self) -> &'static str {
        match self {
            KitchenError::InvalidInput(_) => "INVALID_INPUT",
            KitchenError::InvalidState(_) => "INVALID_STATE",
            KitchenError::NotFound(_) => "NOT_FOUND",
            KitchenError::Conflict(_) => "CONFLICT",
            KitchenError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            KitchenError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            KitchenError::InvalidInput(_) => 400,
            KitchenError::InvalidState(_) => 422,
            KitchenError::NotFound(_) => 404,
            KitchenError::Conflict(_) => 409,
            KitchenError::StoreUnavailable(_) => 503,
            KitchenError::UpstreamUnavailable(_) => 502,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.to_string())
    }
}

impl IntoResponse for KitchenError {
    fn into_response(self) -> Response {
        self.to_response().into_response()
    }
}
