//! Provider adapter trait definition

use crate::credentials::ProviderCredentials;
use crate::error::Result;
use async_trait::async_trait;
use skyforge_core::{Provider, ResourceDescriptor};

/// Resource families every adapter can list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Instances,
    Storage,
    Network,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Instances,
        ResourceKind::Storage,
        ResourceKind::Network,
    ];
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Instances => write!(f, "instances"),
            ResourceKind::Storage => write!(f, "storage"),
            ResourceKind::Network => write!(f, "network"),
        }
    }
}

/// Provider adapter abstraction trait
///
/// All providers (AWS, Azure, GCP) implement this trait so the reconciler
/// can list live resources and probe connectivity without knowing the
/// provider's response shapes.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the provider this adapter talks to
    fn provider(&self) -> Provider;

    /// One cheap call proving the account is reachable with these credentials
    async fn probe(&self) -> Result<()>;

    /// Virtual machines
    async fn list_instances(&self) -> Result<Vec<ResourceDescriptor>>;

    /// Buckets / storage accounts
    async fn list_storage(&self) -> Result<Vec<ResourceDescriptor>>;

    /// VPCs, networks, resource groups
    async fn list_network(&self) -> Result<Vec<ResourceDescriptor>>;

    async fn list(&self, kind: ResourceKind) -> Result<Vec<ResourceDescriptor>> {
        match kind {
            ResourceKind::Instances => self.list_instances().await,
            ResourceKind::Storage => self.list_storage().await,
            ResourceKind::Network => self.list_network().await,
        }
    }
}

/// Builds an adapter from decrypted credentials
///
/// The adapter owns the credentials for the length of one sync task and is
/// dropped with it.
pub trait AdapterFactory: Send + Sync {
    fn adapter(&self, credentials: ProviderCredentials) -> Result<Box<dyn ProviderAdapter>>;
}
