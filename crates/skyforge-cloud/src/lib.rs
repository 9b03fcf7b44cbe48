//! Skyforge Cloud Adapters
//!
//! This crate provides the provider abstraction used by inventory
//! reconciliation: one capability trait, one normalized descriptor type, and
//! the decrypted credential payloads every provider understands.
//!
//! # Supported Providers
//!
//! - **AWS**: EC2 instances, S3 buckets, VPCs (via aws CLI)
//! - **Azure**: VMs, storage accounts, resource groups (via ARM REST API)
//! - **GCP**: Compute instances, Cloud Storage buckets, VPC networks (via REST API)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              skyforge-inventory                  │
//! │         (reconciler / health monitor)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                skyforge-cloud                    │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  trait ProviderAdapter { ... }            │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ Descriptors  │  │ Credentials  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬──────────────┬────────┘
//!         │                 │              │
//! ┌───────▼──────┐ ┌────────▼─────┐ ┌──────▼───────┐
//! │     aws      │ │    azure     │ │     gcp      │
//! └──────────────┘ └──────────────┘ └──────────────┘
//! ```

pub mod credentials;
pub mod error;
pub mod provider;

// Re-exports
pub use credentials::{
    AwsCredentials, AzureCredentials, CredentialEnv, DEFAULT_AWS_REGION, GcpCredentials,
    ProviderCredentials,
};
pub use error::{CloudError, Result};
pub use provider::{AdapterFactory, ProviderAdapter, ResourceKind};
pub use skyforge_core::{Provider, ResourceDescriptor};
