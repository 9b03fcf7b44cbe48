//! Skyforge core
//!
//! Shared data model and the state store used by the provisioning pipeline
//! and the inventory reconciler.
//!
//! The store is the single source of truth. Every job or sync task clones its
//! own [`StateStore`] handle; there are no locks shared across jobs beyond the
//! store's own write lock.

pub mod error;
pub mod model;
pub mod store;

// Re-exports
pub use error::{Result, StoreError, UnknownProvider};
pub use model::{
    CloudCredential, HealthSample, HealthStatus, NewResource, OutputMap, Project, Provider,
    ProviderHealth, Resource, ResourceDescriptor, ResourceInventory, ResourceStatus,
};
pub use store::{StateStore, SyncStats, SyncTransaction};
