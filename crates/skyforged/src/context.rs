//! Shared wiring for every subcommand

use anyhow::Context as _;
use skyforge_config::DaemonConfig;
use skyforge_core::StateStore;
use skyforge_inventory::{HealthMonitor, Reconciler};
use skyforge_provision::{
    JobQueue, Orchestrator, OrchestratorSettings, TerraformCli, WorkerPool, WorkspaceManager,
};
use skyforge_vault::CredentialVault;
use std::path::PathBuf;
use std::sync::Arc;

use crate::adapters::CloudAdapters;

/// Command-line values that take precedence over the configuration file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub state: Option<PathBuf>,
    pub module_root: Option<PathBuf>,
    pub workers: Option<usize>,
}

pub struct AppContext {
    pub config: DaemonConfig,
    pub store: StateStore,
    pub vault: Arc<CredentialVault>,
}

impl AppContext {
    pub async fn load(overrides: Overrides, secret_key: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match &overrides.config {
            Some(path) => skyforge_config::load_from(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => skyforge_config::load().context("Failed to load configuration")?,
        };
        apply_overrides(&mut config, overrides);
        config.module_root = std::fs::canonicalize(&config.module_root).with_context(|| {
            format!("Module root {} not found", config.module_root.display())
        })?;

        let secret = skyforge_config::secret_key(secret_key)?;
        let vault = Arc::new(CredentialVault::from_secret(&secret));

        let store = match &config.state_path {
            Some(path) => StateStore::open(path)
                .await
                .with_context(|| format!("Failed to open state file {}", path.display()))?,
            None => {
                tracing::warn!("No state_path configured, state is kept in memory only");
                StateStore::in_memory()
            }
        };

        Ok(Self {
            config,
            store,
            vault,
        })
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        let executor = TerraformCli::new(&self.config.terraform_bin)
            .with_timeout(self.config.step_timeout());
        Arc::new(Orchestrator::new(
            self.store.clone(),
            self.vault.clone(),
            WorkspaceManager::new(&self.config.module_root, &self.config.workspace_root),
            Arc::new(executor),
            OrchestratorSettings {
                run_plan: self.config.run_plan,
                resource_prefix: self.config.resource_prefix.clone(),
            },
        ))
    }

    /// Queue plus a running pool of `workers` workers
    pub fn pipeline(&self, workers: usize) -> (JobQueue, WorkerPool) {
        let (queue, receiver) = JobQueue::new(self.store.clone());
        let pool = WorkerPool::spawn(self.orchestrator(), receiver, workers);
        (queue, pool)
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::new(Reconciler::new(
            self.store.clone(),
            self.vault.clone(),
            Arc::new(CloudAdapters),
            HealthMonitor::default(),
        ))
    }
}

fn apply_overrides(config: &mut DaemonConfig, overrides: Overrides) {
    if let Some(state) = overrides.state {
        config.state_path = Some(state);
    }
    if let Some(module_root) = overrides.module_root {
        config.module_root = module_root;
    }
    if let Some(workers) = overrides.workers.filter(|w| *w > 0) {
        config.workers = workers;
    }
}
