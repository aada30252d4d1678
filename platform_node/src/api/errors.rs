//! API error surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EngineError;

/// Structured error payload returned by every JSON route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: u64,
}

impl ApiError {
    pub fn new(code: u16, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    pub fn with_details(code: u16, message: String, details: serde_json::Value) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    // Common constructors
    pub fn bad_request(message: &str) -> Self {
        Self::new(400, message.to_string())
    }

    pub fn unauthorized(message: &str) -> Self {
        Self::new(401, message.to_string())
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(403, message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        Self::new(404, message.to_string())
    }

    pub fn internal_server_error(message: &str) -> Self {
        Self::new(500, message.to_string())
    }

    pub fn service_unavailable(message: &str) -> Self {
        Self::new(503, message.to_string())
    }

    // Domain-specific constructors
    pub fn incomplete_progress(completed: u64, total: u64) -> Self {
        Self::with_details(
            400,
            "Course progress incomplete".to_string(),
            serde_json::json!({
                "completed": completed,
                "total": total,
            }),
        )
    }

    pub fn access_expired() -> Self {
        Self::new(403, "Access to this course has expired".to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Unauthenticated => Self::unauthorized("Missing or invalid credentials"),
            EngineError::ProfileMissing => Self::forbidden("Profile not found"),
            EngineError::Forbidden => Self::forbidden("Access denied: admins only"),
            EngineError::InvalidCourse => Self::bad_request("Course does not exist"),
            EngineError::InvalidTarget => {
                Self::bad_request("Target must be an account id or an email")
            }
            EngineError::IncompleteProgress { completed, total } => {
                Self::incomplete_progress(completed, total)
            }
            EngineError::AccessExpired => Self::access_expired(),
            EngineError::CodeGenerationFailed => {
                Self::internal_server_error("Could not issue a validation code")
            }
            EngineError::NotFound => Self::not_found("Not found"),
            // Transient store trouble is logged server-side and surfaced
            // without internal detail.
            EngineError::Store(e) => {
                log::error!("store error: {e}");
                Self::service_unavailable("Service temporarily unavailable")
            }
        }
    }
}

impl From<crate::storage::StoreError> for ApiError {
    fn from(err: crate::storage::StoreError) -> Self {
        EngineError::from(err).into()
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
