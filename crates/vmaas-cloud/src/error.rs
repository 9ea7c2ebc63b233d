//! Provisioning error types

use thiserror::Error;

/// Errors surfaced by the provisioning core
#[derive(Error, Debug)]
pub enum CloudError {
    /// A desired-state field is missing or malformed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An exact-match lookup returned zero or several candidates
    #[error("Expected exactly one match for {what}, found {count}")]
    AmbiguousMatch { what: String, count: usize },

    /// A clone was accepted but never showed up in the instance list
    #[error("get cloned instance failed: {name} matched {count} instances")]
    CloneNotVisible { name: String, count: usize },

    /// The backend answered with `success: false`
    #[error("API call failed: {0}")]
    ApiFailure(String),

    /// The backend answered with a non-success HTTP status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("State file error: {0}")]
    StateError(String),

    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Whether the retry executor may attempt the call again
    pub fn is_retryable(&self) -> bool {
        !matches!(self, CloudError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
