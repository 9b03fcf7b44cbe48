//! Azure adapter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("Azure authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("ARM request failed ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl From<AzureError> for skyforge_cloud::CloudError {
    fn from(err: AzureError) -> Self {
        match err {
            AzureError::AuthenticationFailed(msg) => {
                skyforge_cloud::CloudError::AuthenticationFailed(msg)
            }
            AzureError::JsonError(e) => skyforge_cloud::CloudError::Json(e),
            AzureError::Http(e) if e.is_timeout() => {
                skyforge_cloud::CloudError::Timeout(e.to_string())
            }
            other => skyforge_cloud::CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
