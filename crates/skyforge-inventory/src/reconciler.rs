//! Inventory reconciliation
//!
//! One cycle fans out a task per user and, inside it, a task per stored
//! credential. A credential's writes are buffered in a [`SyncTransaction`]
//! and committed together; a failing credential only loses its own writes.

use crate::error::{InventoryError, Result};
use crate::health::HealthMonitor;
use skyforge_cloud::{AdapterFactory, ProviderCredentials, ResourceKind};
use skyforge_core::{CloudCredential, HealthStatus, StateStore, SyncStats};
use skyforge_vault::CredentialVault;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Result of one credential's sync task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOutcome {
    /// Probe passed and listings were committed
    Synced(SyncStats),

    /// Probe failed; only the health row was written
    Unreachable,
}

/// Totals for one reconciliation cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub users: usize,
    pub credentials: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CycleSummary {
    fn absorb(&mut self, other: CycleSummary) {
        self.users += other.users;
        self.credentials += other.credentials;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

pub struct Reconciler {
    store: StateStore,
    vault: Arc<CredentialVault>,
    adapters: Arc<dyn AdapterFactory>,
    monitor: HealthMonitor,
}

impl Reconciler {
    pub fn new(
        store: StateStore,
        vault: Arc<CredentialVault>,
        adapters: Arc<dyn AdapterFactory>,
        monitor: HealthMonitor,
    ) -> Self {
        Self {
            store,
            vault,
            adapters,
            monitor,
        }
    }

    /// Run one full cycle over every user that owns a credential
    pub async fn sync_all(self: Arc<Self>) -> Result<CycleSummary> {
        let users = self.store.users_with_credentials().await?;
        tracing::info!("Starting inventory sync for {} users", users.len());

        let mut tasks = JoinSet::new();
        for user_id in users {
            let this = self.clone();
            tasks.spawn(async move { this.sync_user(user_id).await });
        }

        let mut summary = CycleSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(user_summary)) => summary.absorb(user_summary),
                Ok(Err(e)) => {
                    summary.users += 1;
                    tracing::error!("User sync failed: {}", e);
                }
                Err(e) => {
                    summary.users += 1;
                    tracing::error!("User sync task ended abnormally: {}", e);
                }
            }
        }

        tracing::info!(
            users = summary.users,
            credentials = summary.credentials,
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Inventory sync finished"
        );
        Ok(summary)
    }

    /// Sync every credential of one user, each in its own task
    pub async fn sync_user(self: Arc<Self>, user_id: i64) -> Result<CycleSummary> {
        let credentials = self.store.credentials_for(user_id).await?;
        let mut summary = CycleSummary {
            users: 1,
            credentials: credentials.len(),
            ..Default::default()
        };

        let mut tasks = JoinSet::new();
        for credential in credentials {
            let this = self.clone();
            tasks.spawn(async move {
                let id = credential.id;
                (id, this.sync_credential(&credential).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(CredentialOutcome::Synced(_)))) => summary.succeeded += 1,
                Ok((id, Ok(CredentialOutcome::Unreachable))) => {
                    tracing::warn!(
                        user_id,
                        credential_id = id,
                        "Provider unreachable, listings skipped"
                    );
                    summary.failed += 1;
                }
                Ok((id, Err(e))) => {
                    tracing::error!(
                        user_id,
                        credential_id = id,
                        "Credential sync rolled back: {}",
                        e
                    );
                    summary.failed += 1;
                }
                Err(e) => {
                    tracing::error!(user_id, "Credential sync task ended abnormally: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Probe, list and upsert for one credential
    pub async fn sync_credential(&self, credential: &CloudCredential) -> Result<CredentialOutcome> {
        let payload = self
            .vault
            .decrypt(&credential.encrypted_data)
            .map_err(|e| InventoryError::Credential {
                credential_id: credential.id,
                reason: e.to_string(),
            })?;
        let credentials = ProviderCredentials::from_json(credential.provider, &payload)
            .map_err(|e| InventoryError::Credential {
                credential_id: credential.id,
                reason: e.to_string(),
            })?;
        drop(payload);

        let adapter = self
            .adapters
            .adapter(credentials)
            .map_err(|e| InventoryError::Credential {
                credential_id: credential.id,
                reason: e.to_string(),
            })?;

        let mut tx = self.store.begin_sync(credential.user_id);
        let sample = self.monitor.probe(adapter.as_ref()).await;
        let unreachable = sample.status == HealthStatus::Error;
        tx.upsert_health(credential.provider, credential.id, sample);

        if unreachable {
            self.store.commit_sync(tx).await?;
            return Ok(CredentialOutcome::Unreachable);
        }

        let transient = |source| InventoryError::TransientProvider {
            provider: credential.provider,
            credential_id: credential.id,
            source,
        };
        let (instances, storage, network) = tokio::try_join!(
            adapter.list(ResourceKind::Instances),
            adapter.list(ResourceKind::Storage),
            adapter.list(ResourceKind::Network),
        )
        .map_err(transient)?;

        for descriptor in instances.into_iter().chain(storage).chain(network) {
            tx.upsert_inventory(credential.provider, descriptor);
        }

        let stats = self.store.commit_sync(tx).await?;
        tracing::info!(
            user_id = credential.user_id,
            provider = %credential.provider,
            credential_id = credential.id,
            inserted = stats.inserted,
            updated = stats.updated,
            "Credential synced"
        );
        Ok(CredentialOutcome::Synced(stats))
    }
}
