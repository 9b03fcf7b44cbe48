//! Azure provider adapter for Skyforge
//!
//! Lists virtual machines, storage accounts and resource groups through the
//! Azure Resource Manager REST API, authenticating as a service principal
//! (client-credentials grant).
//!
//! # Example
//!
//! ```ignore
//! use skyforge_cloud::ProviderAdapter;
//! use skyforge_cloud_azure::AzureAdapter;
//!
//! let adapter = AzureAdapter::new(credentials)?;
//! adapter.probe().await?;
//! let vms = adapter.list_instances().await?;
//! ```

pub mod arm;
pub mod error;
pub mod provider;

pub use arm::{ArmClient, StorageAccount, VirtualMachine};
pub use error::{AzureError, Result};
pub use provider::AzureAdapter;
