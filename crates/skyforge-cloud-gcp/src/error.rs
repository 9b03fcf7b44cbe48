//! GCP adapter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    #[error("GCP authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("GCP request failed ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<GcpError> for skyforge_cloud::CloudError {
    fn from(err: GcpError) -> Self {
        match err {
            GcpError::InvalidKey(msg) => skyforge_cloud::CloudError::InvalidCredentials(msg),
            GcpError::AuthenticationFailed(msg) => {
                skyforge_cloud::CloudError::AuthenticationFailed(msg)
            }
            GcpError::JsonError(e) => skyforge_cloud::CloudError::Json(e),
            GcpError::Http(e) if e.is_timeout() => {
                skyforge_cloud::CloudError::Timeout(e.to_string())
            }
            other => skyforge_cloud::CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GcpError>;
