//! CMP backend error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CmpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CMP API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },

    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl From<CmpError> for vmaas_cloud::CloudError {
    fn from(err: CmpError) -> Self {
        match err {
            CmpError::Api { status, message } => vmaas_cloud::CloudError::Api { status, message },
            CmpError::InvalidConfig(msg) => vmaas_cloud::CloudError::InvalidConfig(msg),
            other => vmaas_cloud::CloudError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CmpError>;
