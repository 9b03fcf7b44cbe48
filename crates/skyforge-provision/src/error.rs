//! Provisioning error types

use skyforge_core::{Provider, ResourceStatus, StoreError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Resource not found: {0}")]
    NotFound(i64),

    #[error("Resource {id} is {status}, only pending resources can be provisioned")]
    InvalidState { id: i64, status: ResourceStatus },

    #[error("Module not found: {module}. Searched in: {}", display_paths(.searched))]
    ModuleNotFound {
        module: String,
        searched: Vec<PathBuf>,
    },

    #[error("Invalid variables for module {module}: {reason}")]
    Validation { module: String, reason: String },

    #[error("No {provider} credential stored for user {user_id}")]
    MissingCredential { user_id: i64, provider: Provider },

    #[error("Credential {credential_id} could not be decrypted: {reason}")]
    Decryption { credential_id: i64, reason: String },

    #[error("Credential {credential_id} payload is unusable: {reason}")]
    InvalidCredential { credential_id: i64, reason: String },

    #[error("{step} failed: {message}")]
    ExternalTool { step: &'static str, message: String },

    #[error("Failed to queue provisioning task: {0}")]
    Enqueue(String),

    #[error("Job aborted: {0}")]
    Internal(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    let joined: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
    format!("[{}]", joined.join(", "))
}

impl ProvisionError {
    /// Stable tag recorded as `terraform_output.error_kind`
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::NotFound(_) => "not_found",
            ProvisionError::InvalidState { .. } => "invalid_state",
            ProvisionError::ModuleNotFound { .. } => "module_not_found",
            ProvisionError::Validation { .. } => "validation",
            ProvisionError::MissingCredential { .. } => "missing_credential",
            ProvisionError::Decryption { .. } => "decryption",
            ProvisionError::InvalidCredential { .. } => "validation",
            ProvisionError::ExternalTool { .. } => "external_tool",
            ProvisionError::Enqueue(_) => "enqueue",
            ProvisionError::Internal(_) => "internal",
            ProvisionError::Store(_) => "store",
            ProvisionError::Io(_) => "io",
            ProvisionError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
