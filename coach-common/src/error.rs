//! Common error types for the coaching backend

use thiserror::Error;

/// Common result type for coaching backend operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the core and the HTTP service
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request conflicts with stored state (e.g. flag already escalated)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Escalation graph rejected a change
    #[error("Escalation error: {0}")]
    Escalation(#[from] crate::flags::EscalationError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
