//! Cloud adapter error types

use thiserror::Error;

/// Cloud adapter errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Required CLI not found: {0}")]
    ToolNotFound(String),

    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
