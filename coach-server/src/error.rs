//! Error types for coach-server
//!
//! Every handler returns [`ApiResult`]; failures render as
//! `{"error": {"code": "...", "message": "..."}}` with a matching status.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use coach_common::EscalationError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or unknown credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// coach-common error
    #[error(transparent)]
    Common(#[from] coach_common::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Common(coach_common::Error::Database(err))
    }
}

impl From<EscalationError> for ApiError {
    fn from(err: EscalationError) -> Self {
        ApiError::Common(coach_common::Error::Escalation(err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        use coach_common::Error as Common;

        match self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Common(err) => match err {
                Common::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                Common::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                Common::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                Common::Escalation(EscalationError::UnknownFlag(_)) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND")
                }
                Common::Escalation(EscalationError::AlreadySuperseded { .. }) => {
                    (StatusCode::CONFLICT, "ALREADY_ESCALATED")
                }
                Common::Escalation(_) => (StatusCode::BAD_REQUEST, "INVALID_ESCALATION"),
                Common::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                Common::Io(_) | Common::Config(_) | Common::Internal(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.parts();
        if status.is_server_error() {
            error!("{}", self);
        }

        let message = match &self {
            ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Internal(msg) => msg.clone(),
            ApiError::Common(err) => err.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
