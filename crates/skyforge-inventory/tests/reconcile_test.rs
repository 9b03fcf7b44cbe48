use async_trait::async_trait;
use serde_json::json;
use skyforge_cloud::{
    AdapterFactory, CloudError, Provider, ProviderAdapter, ProviderCredentials, ResourceDescriptor,
};
use skyforge_core::{HealthStatus, StateStore};
use skyforge_inventory::{CHECK_TIMEOUT, HealthMonitor, Reconciler, Scheduler};
use skyforge_vault::CredentialVault;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const SECRET: &str = "inventory-test-secret";

/// Adapter whose behaviour is picked by the credential's access key
struct ScenarioAdapter {
    scenario: String,
    listings: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderAdapter for ScenarioAdapter {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    async fn probe(&self) -> skyforge_cloud::Result<()> {
        match self.scenario.as_str() {
            "down" => Err(CloudError::ApiError("connection refused".to_string())),
            "slow" => {
                tokio::time::sleep(Duration::from_millis(1000)).await;
                Ok(())
            }
            "stalled" => std::future::pending().await,
            _ => Ok(()),
        }
    }

    async fn list_instances(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            ResourceDescriptor::new(format!("i-{}", self.scenario), "web", "vm")
                .with_status("running")
                .with_region("us-east-1")
                .with_metadata("ami_id", json!("ami-1")),
        ])
    }

    async fn list_storage(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if self.scenario == "broken" {
            return Err(CloudError::ApiError("AccessDenied".to_string()));
        }
        Ok(vec![
            ResourceDescriptor::new(format!("bucket-{}", self.scenario), "assets", "storage")
                .with_status("active"),
        ])
    }

    async fn list_network(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        Ok(vec![ResourceDescriptor::new(
            format!("vpc-{}", self.scenario),
            "main",
            "vpc",
        )])
    }
}

#[derive(Default)]
struct ScenarioFactory {
    listings: Arc<AtomicUsize>,
}

impl AdapterFactory for ScenarioFactory {
    fn adapter(
        &self,
        credentials: ProviderCredentials,
    ) -> skyforge_cloud::Result<Box<dyn ProviderAdapter>> {
        let ProviderCredentials::Aws(aws) = credentials else {
            return Err(CloudError::InvalidCredentials("aws only".to_string()));
        };
        Ok(Box::new(ScenarioAdapter {
            scenario: aws.access_key,
            listings: self.listings.clone(),
        }))
    }
}

struct Harness {
    store: StateStore,
    vault: Arc<CredentialVault>,
    factory: Arc<ScenarioFactory>,
}

impl Harness {
    fn new() -> Self {
        Self {
            store: StateStore::in_memory(),
            vault: Arc::new(CredentialVault::from_secret(SECRET)),
            factory: Arc::new(ScenarioFactory::default()),
        }
    }

    async fn add(&self, user_id: i64, scenario: &str) -> i64 {
        let cipher = self
            .vault
            .seal_json(&json!({"access_key": scenario, "secret_key": "x"}))
            .unwrap();
        self.store
            .add_credential(user_id, Provider::Aws, scenario, cipher)
            .await
            .unwrap()
            .id
    }

    fn reconciler(&self) -> Arc<Reconciler> {
        Arc::new(Reconciler::new(
            self.store.clone(),
            self.vault.clone(),
            self.factory.clone(),
            HealthMonitor::default(),
        ))
    }

    fn listings(&self) -> usize {
        self.factory.listings.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn test_reconcile_twice_is_idempotent() {
    let h = Harness::new();
    h.add(1, "healthy").await;
    let reconciler = h.reconciler();

    let first = reconciler.clone().sync_all().await.unwrap();
    assert_eq!(first.users, 1);
    assert_eq!(first.succeeded, 1);
    let before = h.store.inventory_for(1).await.unwrap();
    assert_eq!(before.len(), 3);

    reconciler.sync_all().await.unwrap();
    let after = h.store.inventory_for(1).await.unwrap();
    assert_eq!(after.len(), 3);

    for row in &after {
        let old = before
            .iter()
            .find(|r| r.resource_id == row.resource_id)
            .unwrap();
        assert_eq!(old.id, row.id);
        assert!(row.last_synced_at >= old.last_synced_at);
    }

    let health = h.store.health_for(1).await.unwrap();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].status, HealthStatus::Healthy);
}

#[tokio::test]
async fn test_unreachable_provider_skips_listings() {
    let h = Harness::new();
    let credential_id = h.add(1, "down").await;

    let summary = h.reconciler().sync_all().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(h.listings(), 0);
    assert!(h.store.inventory_for(1).await.unwrap().is_empty());

    let health = h.store.health_for(1).await.unwrap();
    assert_eq!(health.len(), 1);
    assert_eq!(health[0].credential_id, credential_id);
    assert_eq!(health[0].status, HealthStatus::Error);
    assert!(
        health[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection refused")
    );
}

#[tokio::test]
async fn test_failing_credential_is_isolated() {
    let h = Harness::new();
    h.add(1, "healthy").await;
    h.add(1, "broken").await;
    h.add(2, "healthy").await;

    let summary = h.reconciler().sync_all().await.unwrap();
    assert_eq!(summary.users, 2);
    assert_eq!(summary.credentials, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);

    let user1 = h.store.inventory_for(1).await.unwrap();
    assert_eq!(user1.len(), 3);
    assert!(user1.iter().all(|r| !r.resource_id.contains("broken")));

    // the broken credential's health write was rolled back with its listings
    assert_eq!(h.store.health_for(1).await.unwrap().len(), 1);
    assert_eq!(h.store.inventory_for(2).await.unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_probe_at_threshold_is_degraded_and_still_lists() {
    let h = Harness::new();
    h.add(1, "slow").await;

    let summary = h.reconciler().sync_all().await.unwrap();
    assert_eq!(summary.succeeded, 1);

    let health = h.store.health_for(1).await.unwrap();
    assert_eq!(health[0].status, HealthStatus::Degraded);
    assert_eq!(health[0].response_time_ms, 1000);
    assert_eq!(h.listings(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_provider_times_out_as_error() {
    let h = Harness::new();
    h.add(1, "stalled").await;
    h.add(1, "healthy").await;

    let summary = h.reconciler().sync_all().await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let health = h.store.health_for(1).await.unwrap();
    let stalled = health
        .iter()
        .find(|row| row.status == HealthStatus::Error)
        .unwrap();
    assert_eq!(stalled.response_time_ms, CHECK_TIMEOUT.as_millis() as u64);
    assert!(stalled.error_message.as_deref().unwrap().contains("timed out"));

    // only the healthy credential listed anything
    assert_eq!(h.listings(), 3);
    let inventory = h.store.inventory_for(1).await.unwrap();
    assert!(inventory.iter().all(|r| !r.resource_id.contains("stalled")));
}

#[tokio::test]
async fn test_undecryptable_credential_counts_as_failed() {
    let h = Harness::new();
    let other = CredentialVault::from_secret("rotated-away");
    let cipher = other
        .seal_json(&json!({"access_key": "healthy", "secret_key": "x"}))
        .unwrap();
    h.store
        .add_credential(1, Provider::Aws, "stale", cipher)
        .await
        .unwrap();

    let summary = h.reconciler().sync_all().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert!(h.store.health_for(1).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scheduler_fires_on_fixed_interval() {
    let h = Harness::new();
    h.add(1, "healthy").await;

    let scheduler = Scheduler::new(h.reconciler(), Duration::from_secs(600));
    let cycles = scheduler
        .run(tokio::time::sleep(Duration::from_secs(1201)))
        .await;
    assert_eq!(cycles, 3);

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.store.inventory_for(1).await.unwrap().len(), 3);
}
