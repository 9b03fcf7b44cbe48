//! Reconciliation error types

use skyforge_core::{Provider, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    /// Ciphertext or payload unusable. Never carries secret material.
    #[error("Credential {credential_id} is unusable: {reason}")]
    Credential { credential_id: i64, reason: String },

    /// Listing failed; retried on the next scheduled cycle
    #[error("{provider} listing failed for credential {credential_id}: {source}")]
    TransientProvider {
        provider: Provider,
        credential_id: i64,
        #[source]
        source: skyforge_cloud::CloudError,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, InventoryError>;
