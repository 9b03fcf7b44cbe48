//! Provisioning job state machine
//!
//! A job moves its resource `pending -> provisioning -> {active, failed}`.
//! Every failure after the `provisioning` commit is recorded on the resource
//! with the logs accumulated so far; nothing is retried.

use crate::credentials::resolve_env;
use crate::error::{ProvisionError, Result};
use crate::executor::{IacExecutor, Step, StepOutput, parse_outputs, parse_resource_counts};
use crate::queue::ResourceLocks;
use crate::variables::{VariableContext, module_for, translate};
use crate::workspace::WorkspaceManager;
use serde_json::json;
use skyforge_cloud::CredentialEnv;
use skyforge_core::{OutputMap, Provider, Resource, ResourceStatus, StateStore};
use skyforge_vault::CredentialVault;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Provision,
    Destroy,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Provision => write!(f, "provision"),
            JobKind::Destroy => write!(f, "destroy"),
        }
    }
}

/// One unit of queued work
#[derive(Debug, Clone)]
pub struct Job {
    pub kind: JobKind,
    pub resource_id: i64,
    pub provider: Provider,
    pub module: String,
    pub variables: OutputMap,
}

impl Job {
    pub fn provision(
        resource_id: i64,
        provider: Provider,
        module: impl Into<String>,
        variables: OutputMap,
    ) -> Self {
        Self {
            kind: JobKind::Provision,
            resource_id,
            provider,
            module: module.into(),
            variables,
        }
    }

    /// Provision job for a stored resource, module chosen from its type
    pub fn provision_resource(resource: &Resource) -> Self {
        Self::provision(
            resource.id,
            resource.provider,
            module_for(resource.provider, &resource.resource_type),
            resource.configuration.clone(),
        )
    }

    pub fn destroy_resource(resource: &Resource) -> Self {
        Self {
            kind: JobKind::Destroy,
            ..Self::provision_resource(resource)
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Run `plan -out=tfplan` before apply
    pub run_plan: bool,

    /// Prefix for derived names
    pub resource_prefix: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            run_plan: true,
            resource_prefix: "skyforge".to_string(),
        }
    }
}

/// Tool logs with a section per step
#[derive(Debug, Default)]
struct Logs {
    text: String,
}

impl Logs {
    fn section(&mut self, step: Step, output: &StepOutput) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(&format!("--- {} ---\n", step.label()));
        self.text.push_str(&output.text);
    }

    fn line(&mut self, line: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(line);
        self.text.push('\n');
    }
}

/// Drives provisioning and destroy jobs
pub struct Orchestrator {
    store: StateStore,
    vault: Arc<CredentialVault>,
    workspaces: WorkspaceManager,
    executor: Arc<dyn IacExecutor>,
    locks: ResourceLocks,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        store: StateStore,
        vault: Arc<CredentialVault>,
        workspaces: WorkspaceManager,
        executor: Arc<dyn IacExecutor>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            store,
            vault,
            workspaces,
            executor,
            locks: ResourceLocks::default(),
            settings,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Run one job to completion
    ///
    /// Provision returns the terminal status it recorded. Errors are only
    /// returned when nothing could be recorded on the resource (absent,
    /// not pending, store failure) or, for destroy, after the destroy logs
    /// were saved.
    pub async fn execute(&self, job: Job) -> Result<ResourceStatus> {
        let _guard = self.locks.lock(job.resource_id).await;
        tracing::info!(
            resource_id = job.resource_id,
            provider = %job.provider,
            module = %job.module,
            "Starting {} job",
            job.kind
        );

        match job.kind {
            JobKind::Provision => self.provision(job).await,
            JobKind::Destroy => self.destroy(job).await,
        }
    }

    async fn provision(&self, job: Job) -> Result<ResourceStatus> {
        let resource = self
            .store
            .get_resource(job.resource_id)
            .await?
            .ok_or(ProvisionError::NotFound(job.resource_id))?;

        if resource.status != ResourceStatus::Pending {
            return Err(ProvisionError::InvalidState {
                id: resource.id,
                status: resource.status,
            });
        }

        self.store
            .transition(resource.id, ResourceStatus::Provisioning, None)
            .await?;

        let started = Instant::now();
        let mut logs = Logs::default();
        let result = self.run_provision(&job, &resource, &mut logs).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let (status, output) = match result {
            Ok(mut fields) => {
                fields.insert("logs".to_string(), json!(logs.text));
                fields.insert("duration_ms".to_string(), json!(duration_ms));
                (ResourceStatus::Active, fields)
            }
            Err(e) => {
                tracing::error!(
                    resource_id = resource.id,
                    kind = e.kind(),
                    "Provisioning failed: {}",
                    e
                );
                logs.line(&format!("[Error] {}", e));
                let mut fields = failure_output(&e, logs.text);
                fields.insert("duration_ms".to_string(), json!(duration_ms));
                (ResourceStatus::Failed, fields)
            }
        };

        self.store
            .transition(resource.id, status, Some(output))
            .await?;
        tracing::info!(resource_id = resource.id, status = %status, "Provisioning finished");
        Ok(status)
    }

    /// Steps 3-7; returns the structured fields of a successful run
    async fn run_provision(
        &self,
        job: &Job,
        resource: &Resource,
        logs: &mut Logs,
    ) -> Result<OutputMap> {
        let workspace = self.workspaces.prepare(resource.id, &job.module).await?;

        let ctx = VariableContext {
            resource_id: resource.id,
            resource_name: &resource.name,
            prefix: &self.settings.resource_prefix,
        };
        let variables = translate(&job.module, &ctx, &job.variables)?;
        self.workspaces.write_variables(&workspace, &variables).await?;

        let user_id = self.store.resource_owner(resource).await?;
        let (_, env) = resolve_env(&self.store, &self.vault, user_id, job.provider).await?;

        self.step(Step::Init, &workspace.dir, &env, logs).await?;
        if self.settings.run_plan {
            self.step(Step::Plan, &workspace.dir, &env, logs).await?;
        }
        let apply = self
            .step(
                Step::Apply {
                    saved_plan: self.settings.run_plan,
                },
                &workspace.dir,
                &env,
                logs,
            )
            .await?;

        let mut fields = OutputMap::new();
        if let Some(counts) = parse_resource_counts(&apply.text) {
            fields.insert("resources".to_string(), counts);
        }
        match self.executor.run(Step::Output, &workspace.dir, &env).await {
            Ok(out) if out.exit_ok => {
                if let Some(outputs) = parse_outputs(&out.text) {
                    fields.insert("outputs".to_string(), outputs);
                }
            }
            Ok(_) => tracing::debug!(resource_id = resource.id, "No module outputs"),
            Err(e) => tracing::warn!(resource_id = resource.id, "Could not read outputs: {}", e),
        }

        Ok(fields)
    }

    /// Run one step, log it, and stop the sequence on failure
    async fn step(
        &self,
        step: Step,
        dir: &Path,
        env: &CredentialEnv,
        logs: &mut Logs,
    ) -> Result<StepOutput> {
        let output = self.executor.run(step, dir, env).await?;
        logs.section(step, &output);

        if output.failed() {
            let message = if output.exit_ok {
                "error reported in tool output".to_string()
            } else {
                "tool exited with a non-zero status".to_string()
            };
            return Err(ProvisionError::ExternalTool {
                step: step.name(),
                message,
            });
        }
        Ok(output)
    }

    async fn destroy(&self, job: Job) -> Result<ResourceStatus> {
        let resource = self
            .store
            .get_resource(job.resource_id)
            .await?
            .ok_or(ProvisionError::NotFound(job.resource_id))?;

        let mut logs = Logs::default();
        let result = self.run_destroy(&job, &resource, &mut logs).await;

        let mut fields = OutputMap::new();
        let outcome = match &result {
            Ok(()) => "succeeded",
            Err(e) => {
                tracing::error!(
                    resource_id = resource.id,
                    kind = e.kind(),
                    "Destroy failed: {}",
                    e
                );
                logs.line(&format!("[Error] {}", e));
                fields.insert("destroy_error_kind".to_string(), json!(e.kind()));
                "failed"
            }
        };
        fields.insert("destroy_logs".to_string(), json!(logs.text));
        fields.insert("destroy_status".to_string(), json!(outcome));
        self.store.merge_output(resource.id, fields).await?;

        result.map(|()| resource.status)
    }

    async fn run_destroy(&self, job: &Job, resource: &Resource, logs: &mut Logs) -> Result<()> {
        let workspace = self.workspaces.prepare(resource.id, &job.module).await?;
        let ctx = VariableContext {
            resource_id: resource.id,
            resource_name: &resource.name,
            prefix: &self.settings.resource_prefix,
        };
        let variables = translate(&job.module, &ctx, &job.variables)?;
        self.workspaces.write_variables(&workspace, &variables).await?;

        let user_id = self.store.resource_owner(resource).await?;
        let (_, env) = resolve_env(&self.store, &self.vault, user_id, job.provider).await?;

        self.step(Step::Init, &workspace.dir, &env, logs).await?;
        self.step(Step::Destroy, &workspace.dir, &env, logs).await?;
        Ok(())
    }

    /// Record a failure that escaped the job itself (panic, lost task)
    ///
    /// Only resources still in flight are touched.
    pub async fn fail_unfinished(&self, resource_id: i64, message: &str) -> Result<()> {
        let Some(resource) = self.store.get_resource(resource_id).await? else {
            return Ok(());
        };
        if resource.status.is_terminal() {
            return Ok(());
        }

        let err = ProvisionError::Internal(message.to_string());
        let mut output = resource.terraform_output.clone().unwrap_or_default();
        let mut logs = Logs {
            text: resource.logs().to_string(),
        };
        logs.line(&format!("[Error] {}", err));
        output.extend(failure_output(&err, logs.text));

        self.store
            .transition(resource_id, ResourceStatus::Failed, Some(output))
            .await?;
        Ok(())
    }
}

/// `terraform_output` for a failed job
pub(crate) fn failure_output(err: &ProvisionError, logs: String) -> OutputMap {
    let mut fields = OutputMap::new();
    fields.insert("logs".to_string(), json!(logs));
    fields.insert("error".to_string(), json!(err.to_string()));
    fields.insert("error_kind".to_string(), json!(err.kind()));
    fields
}
