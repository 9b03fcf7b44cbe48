use async_trait::async_trait;
use skyforge_cloud::CredentialEnv;
use skyforge_core::{NewResource, OutputMap, Provider, Resource, ResourceStatus, StateStore};
use skyforge_provision::{
    IacExecutor, Orchestrator, OrchestratorSettings, Step, StepOutput, WorkspaceManager,
};
use skyforge_vault::CredentialVault;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const SECRET: &str = "test-operator-secret";

/// How the stub tool answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Behaviour {
    Succeed,
    PanicOnApply,
    FailOnApply,
}

/// IaC tool stand-in
///
/// Every step records the resource's stored status as seen while the step
/// runs.
pub struct StubTool {
    behaviour: Behaviour,
    store: StateStore,
    pub calls: Mutex<Vec<(i64, &'static str)>>,
    pub observed: Mutex<Vec<ResourceStatus>>,
}

impl StubTool {
    pub fn new(behaviour: Behaviour, store: StateStore) -> Self {
        Self {
            behaviour,
            store,
            calls: Mutex::new(Vec::new()),
            observed: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code)]
    pub fn observed(&self) -> Vec<ResourceStatus> {
        self.observed.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl IacExecutor for StubTool {
    async fn run(
        &self,
        step: Step,
        workspace: &Path,
        _env: &CredentialEnv,
    ) -> skyforge_provision::Result<StepOutput> {
        let resource_id = workspace
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse().ok())
            .unwrap_or(-1);
        self.calls.lock().unwrap().push((resource_id, step.name()));

        if let Some(resource) = self.store.get_resource(resource_id).await? {
            self.observed.lock().unwrap().push(resource.status);
        }

        let is_apply = matches!(step, Step::Apply { .. });
        if self.behaviour == Behaviour::PanicOnApply && is_apply {
            panic!("stub tool crashed");
        }
        if self.behaviour == Behaviour::FailOnApply && is_apply {
            return Ok(StepOutput::failure("Error: creating EC2 Instance: quota exceeded\n"));
        }
        Ok(match step {
            Step::Apply { .. } => StepOutput::success(
                "Apply complete! Resources: 1 added, 0 changed, 0 destroyed.\n",
            ),
            Step::Output => StepOutput::success("{}"),
            other => StepOutput::success(format!("{} ok\n", other.name())),
        })
    }
}

/// Module repository, workspace root, store and vault for one test
pub struct Harness {
    pub modules: TempDir,
    pub work: TempDir,
    pub store: StateStore,
    pub vault: Arc<CredentialVault>,
    pub tool: Arc<StubTool>,
}

impl Harness {
    pub fn new(behaviour: Behaviour) -> Self {
        let modules = tempfile::tempdir().unwrap();
        for module in ["aws_vm", "aws_s3", "azure_vm", "gcp_vm"] {
            let dir = modules.path().join(module);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join("main.tf"), format!("# {}\n", module)).unwrap();
        }

        let store = StateStore::in_memory();
        Self {
            modules,
            work: tempfile::tempdir().unwrap(),
            tool: Arc::new(StubTool::new(behaviour, store.clone())),
            store,
            vault: Arc::new(CredentialVault::from_secret(SECRET)),
        }
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::new(Orchestrator::new(
            self.store.clone(),
            self.vault.clone(),
            WorkspaceManager::new(self.modules.path(), self.work.path()),
            self.tool.clone(),
            OrchestratorSettings::default(),
        ))
    }

    #[allow(dead_code)]
    pub async fn add_aws_credential(&self, user_id: i64) {
        let cipher = self
            .vault
            .encrypt(br#"{"access_key": "AKIATEST", "secret_key": "test-secret"}"#)
            .unwrap();
        self.store
            .add_credential(user_id, Provider::Aws, "default", cipher)
            .await
            .unwrap();
    }

    pub async fn pending_resource(
        &self,
        user_id: i64,
        provider: Provider,
        resource_type: &str,
        configuration: OutputMap,
    ) -> Resource {
        let project = self.store.create_project(user_id, "demo").await.unwrap();
        self.store
            .create_resource(NewResource {
                project_id: project.id,
                name: "web-server".to_string(),
                provider,
                resource_type: resource_type.to_string(),
                configuration,
            })
            .await
            .unwrap()
    }

    /// Poll until the resource reaches a terminal status
    #[allow(dead_code)]
    pub async fn wait_terminal(&self, resource_id: i64) -> Resource {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let resource = self.store.get_resource(resource_id).await.unwrap().unwrap();
            if resource.status.is_terminal() {
                return resource;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "resource {} stuck in {:?}",
                resource_id,
                resource.status
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[allow(dead_code)]
pub fn assert_terminal(resource: &Resource) {
    assert!(matches!(
        resource.status,
        ResourceStatus::Active | ResourceStatus::Failed
    ));
}
