//! AWS provider adapter for Skyforge
//!
//! This crate implements the ProviderAdapter trait for AWS, listing EC2
//! instances, S3 buckets and VPCs for inventory reconciliation.
//!
//! # Requirements
//!
//! - `aws` CLI (v2) must be installed
//! - Credentials are passed through the process environment
//!   (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, ...), never as arguments
//!
//! # Example
//!
//! ```ignore
//! use skyforge_cloud_aws::AwsAdapter;
//! use skyforge_cloud::ProviderAdapter;
//!
//! let adapter = AwsAdapter::new(&credentials);
//! adapter.probe().await?;
//! let instances = adapter.list_instances().await?;
//! ```

pub mod awscli;
pub mod error;
pub mod provider;

pub use awscli::{AwsCli, Bucket, Ec2Instance, Vpc};
pub use error::{AwsError, Result};
pub use provider::AwsAdapter;
