//! State store error types

use crate::model::ResourceStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(i64),

    #[error("Project not found: {0}")]
    ProjectNotFound(i64),

    #[error("Credential not found: {0}")]
    CredentialNotFound(i64),

    #[error("Invalid status transition for resource {id}: {from} -> {to}")]
    InvalidTransition {
        id: i64,
        from: ResourceStatus,
        to: ResourceStatus,
    },

    #[error("State file error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returned when a provider name is not one of aws / azure / gcp
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown provider: {0}")]
pub struct UnknownProvider(pub String);

pub type Result<T> = std::result::Result<T, StoreError>;
