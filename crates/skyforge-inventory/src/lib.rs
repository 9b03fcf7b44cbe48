//! Provider inventory reconciliation
//!
//! [`Scheduler`] ticks on a fixed interval and hands each cycle to the
//! [`Reconciler`], which probes every stored credential through its
//! provider adapter, records the connectivity in the health table and
//! upserts the live resources into the inventory cache.

pub mod error;
pub mod health;
pub mod reconciler;
pub mod scheduler;

pub use error::{InventoryError, Result};
pub use health::{CHECK_TIMEOUT, DEGRADED_THRESHOLD, HealthMonitor};
pub use reconciler::{CredentialOutcome, CycleSummary, Reconciler};
pub use scheduler::Scheduler;
