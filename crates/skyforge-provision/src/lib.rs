//! Asynchronous provisioning pipeline
//!
//! A provisioning request becomes a [`Job`] on the [`JobQueue`]. Workers of
//! the [`WorkerPool`] hand each job to the [`Orchestrator`], which prepares
//! an isolated workspace, translates the resource configuration into module
//! variables, injects the user's decrypted credential through the process
//! environment and drives the IaC tool through init, plan and apply.
//!
//! # Example
//!
//! ```ignore
//! let orchestrator = Arc::new(Orchestrator::new(
//!     store.clone(),
//!     vault,
//!     WorkspaceManager::new("terraform/modules", "/tmp/skyforge-workspaces"),
//!     Arc::new(TerraformCli::default()),
//!     OrchestratorSettings::default(),
//! ));
//! let (queue, receiver) = JobQueue::new(store.clone());
//! let pool = WorkerPool::spawn(orchestrator, receiver, 4);
//!
//! queue.submit(Job::provision_resource(&resource)).await?;
//! ```

pub mod credentials;
pub mod error;
pub mod executor;
pub mod orchestrator;
pub mod queue;
pub mod variables;
pub mod workspace;

pub use credentials::{open_credential, resolve_env, select_credential};
pub use error::{ProvisionError, Result};
pub use executor::{IacExecutor, Step, StepOutput, TerraformCli};
pub use orchestrator::{Job, JobKind, Orchestrator, OrchestratorSettings};
pub use queue::{JobQueue, JobReceiver, ResourceLocks, WorkerPool};
pub use variables::{VariableContext, module_for, translate};
pub use workspace::{Workspace, WorkspaceManager};
