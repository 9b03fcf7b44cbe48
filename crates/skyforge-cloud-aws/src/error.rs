//! AWS adapter error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("aws CLI not found. Please install AWS CLI v2")]
    AwsCliNotFound,

    #[error("aws command failed: {0}")]
    CommandFailed(String),

    #[error("aws command timed out after {0}s")]
    Timeout(u64),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<AwsError> for skyforge_cloud::CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::AwsCliNotFound => skyforge_cloud::CloudError::ToolNotFound("aws".to_string()),
            AwsError::Timeout(secs) => {
                skyforge_cloud::CloudError::Timeout(format!("aws CLI after {}s", secs))
            }
            other => skyforge_cloud::CloudError::ApiError(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;
