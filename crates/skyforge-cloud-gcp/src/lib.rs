//! Google Cloud provider adapter for Skyforge
//!
//! Lists Compute Engine instances, Cloud Storage buckets and VPC networks
//! through the public REST APIs. Access tokens are minted from the service
//! account key with a self-signed RS256 assertion (JWT bearer grant).

pub mod auth;
pub mod client;
pub mod error;
pub mod provider;

pub use auth::ServiceAccountAuth;
pub use client::{GcpClient, GcpBucket, GcpInstance, GcpNetwork};
pub use error::{GcpError, Result};
pub use provider::GcpAdapter;
