//! HTTP API handlers for coach-server

pub mod coaches;
pub mod customers;
pub mod dashboard;
pub mod flags;
pub mod health;
pub mod leads;
pub mod requirements;

use axum::extract::FromRequest;

use crate::error::ApiError;

/// JSON body extractor whose rejections render as [`ApiError`] bodies
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Trim a required text field, rejecting blank values
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional text field; blank becomes `None`
pub(crate) fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
