//! State store
//!
//! In-process relational store with optional JSON persistence. The document
//! layout follows a versioned `state.json` with a `.backup` rotated on every
//! save. Each mutation is applied to a copy of the tables and only swapped in
//! once it has been persisted, so readers never observe half-applied writes.

use crate::error::{Result, StoreError};
use crate::model::{
    CloudCredential, HealthSample, NewResource, OutputMap, Project, Provider, ProviderHealth,
    Resource, ResourceDescriptor, ResourceInventory, ResourceStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tables {
    version: u32,
    updated_at: DateTime<Utc>,
    next_id: i64,
    projects: BTreeMap<i64, Project>,
    resources: BTreeMap<i64, Resource>,
    credentials: BTreeMap<i64, CloudCredential>,
    inventory: BTreeMap<i64, ResourceInventory>,
    health: Vec<ProviderHealth>,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            next_id: 1,
            projects: BTreeMap::new(),
            resources: BTreeMap::new(),
            credentials: BTreeMap::new(),
            inventory: BTreeMap::new(),
            health: Vec::new(),
        }
    }
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn upsert_inventory(
        &mut self,
        user_id: i64,
        provider: Provider,
        descriptor: ResourceDescriptor,
        now: DateTime<Utc>,
    ) -> bool {
        let existing = self.inventory.values_mut().find(|row| {
            row.user_id == user_id
                && row.provider == provider
                && row.resource_id == descriptor.resource_id
        });

        if let Some(row) = existing {
            row.resource_type = descriptor.resource_type;
            row.resource_name = descriptor.resource_name;
            row.region = descriptor.region;
            row.status = descriptor.status;
            row.instance_type = descriptor.instance_type;
            row.public_ip = descriptor.public_ip;
            row.private_ip = descriptor.private_ip;
            row.metadata = descriptor.metadata;
            row.tags = descriptor.tags;
            row.last_synced_at = row.last_synced_at.max(now);
            return false;
        }

        let id = self.allocate_id();
        self.inventory.insert(
            id,
            ResourceInventory {
                id,
                user_id,
                provider,
                resource_type: descriptor.resource_type,
                resource_id: descriptor.resource_id,
                resource_name: descriptor.resource_name,
                region: descriptor.region,
                status: descriptor.status,
                instance_type: descriptor.instance_type,
                public_ip: descriptor.public_ip,
                private_ip: descriptor.private_ip,
                metadata: descriptor.metadata,
                tags: descriptor.tags,
                cost_per_hour: None,
                created_at: now,
                last_synced_at: now,
            },
        );
        true
    }

    fn upsert_health(
        &mut self,
        user_id: i64,
        provider: Provider,
        credential_id: i64,
        sample: HealthSample,
        now: DateTime<Utc>,
    ) {
        let existing = self.health.iter_mut().find(|h| {
            h.user_id == user_id && h.provider == provider && h.credential_id == credential_id
        });

        match existing {
            Some(row) => {
                row.status = sample.status;
                row.response_time_ms = sample.response_time_ms;
                row.error_message = sample.error_message;
                row.last_check_at = now;
            }
            None => self.health.push(ProviderHealth {
                user_id,
                provider,
                credential_id,
                status: sample.status,
                response_time_ms: sample.response_time_ms,
                error_message: sample.error_message,
                last_check_at: now,
            }),
        }
    }
}

/// Buffered inventory and health writes for one credential's sync cycle
///
/// Nothing is visible until [`StateStore::commit_sync`]. Dropping the
/// transaction discards every buffered write.
#[derive(Debug)]
pub struct SyncTransaction {
    user_id: i64,
    ops: Vec<SyncOp>,
}

#[derive(Debug)]
enum SyncOp {
    Inventory {
        provider: Provider,
        descriptor: ResourceDescriptor,
    },
    Health {
        provider: Provider,
        credential_id: i64,
        sample: HealthSample,
    },
}

impl SyncTransaction {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    pub fn upsert_inventory(&mut self, provider: Provider, descriptor: ResourceDescriptor) {
        self.ops.push(SyncOp::Inventory {
            provider,
            descriptor,
        });
    }

    pub fn upsert_health(&mut self, provider: Provider, credential_id: i64, sample: HealthSample) {
        self.ops.push(SyncOp::Health {
            provider,
            credential_id,
            sample,
        });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Counts of rows written by one committed sync transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub inserted: usize,
    pub updated: usize,
    pub health: usize,
}

/// Shared handle to the state tables. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct StateStore {
    tables: Arc<RwLock<Tables>>,
    path: Option<PathBuf>,
}

impl StateStore {
    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            path: None,
        }
    }

    /// Open (or start) a store persisted at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = if path.exists() {
            let content = fs::read_to_string(&path).await?;
            let tables: Tables = serde_json::from_str(&content)?;

            if tables.version > STATE_VERSION {
                return Err(StoreError::State(format!(
                    "State file version {} is newer than supported version {}",
                    tables.version, STATE_VERSION
                )));
            }

            tracing::debug!(
                resources = tables.resources.len(),
                inventory = tables.inventory.len(),
                "Loaded state from {}",
                path.display()
            );
            tables
        } else {
            tracing::debug!("State file not found, starting empty: {}", path.display());
            Tables::default()
        };

        Ok(Self {
            tables: Arc::new(RwLock::new(tables)),
            path: Some(path),
        })
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).await?;
            }
        }

        if path.exists() {
            let backup = path.with_extension("json.backup");
            fs::copy(path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(tables)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
        let mut guard = self.tables.write().await;
        let mut next = guard.clone();
        let out = f(&mut next)?;
        next.updated_at = Utc::now();
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }

    // ========== Projects & Resources ==========

    pub async fn create_project(&self, user_id: i64, name: impl Into<String>) -> Result<Project> {
        let name = name.into();
        self.mutate(|t| {
            let id = t.allocate_id();
            let project = Project {
                id,
                user_id,
                name,
                created_at: Utc::now(),
            };
            t.projects.insert(id, project.clone());
            Ok(project)
        })
        .await
    }

    pub async fn create_resource(&self, new: NewResource) -> Result<Resource> {
        self.mutate(|t| {
            if !t.projects.contains_key(&new.project_id) {
                return Err(StoreError::ProjectNotFound(new.project_id));
            }
            let id = t.allocate_id();
            let resource = Resource {
                id,
                project_id: new.project_id,
                name: new.name,
                provider: new.provider,
                resource_type: new.resource_type,
                status: ResourceStatus::Pending,
                configuration: new.configuration,
                terraform_output: None,
                created_at: Utc::now(),
            };
            t.resources.insert(id, resource.clone());
            Ok(resource)
        })
        .await
    }

    pub async fn get_resource(&self, id: i64) -> Result<Option<Resource>> {
        Ok(self.tables.read().await.resources.get(&id).cloned())
    }

    /// User that owns the resource's project
    pub async fn resource_owner(&self, resource: &Resource) -> Result<i64> {
        self.tables
            .read()
            .await
            .projects
            .get(&resource.project_id)
            .map(|p| p.user_id)
            .ok_or(StoreError::ProjectNotFound(resource.project_id))
    }

    /// Move a resource to `next`, optionally replacing its tool output
    ///
    /// Rejects any move outside the provisioning state machine.
    pub async fn transition(
        &self,
        id: i64,
        next: ResourceStatus,
        output: Option<OutputMap>,
    ) -> Result<Resource> {
        self.mutate(|t| {
            let resource = t
                .resources
                .get_mut(&id)
                .ok_or(StoreError::ResourceNotFound(id))?;

            if !resource.status.can_transition_to(next) {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: resource.status,
                    to: next,
                });
            }

            resource.status = next;
            if let Some(output) = output {
                resource.terraform_output = Some(output);
            }
            tracing::debug!(resource_id = id, status = %next, "Resource status committed");
            Ok(resource.clone())
        })
        .await
    }

    /// Merge fields into a resource's tool output without touching its status
    pub async fn merge_output(&self, id: i64, fields: OutputMap) -> Result<Resource> {
        self.mutate(|t| {
            let resource = t
                .resources
                .get_mut(&id)
                .ok_or(StoreError::ResourceNotFound(id))?;
            resource
                .terraform_output
                .get_or_insert_with(OutputMap::new)
                .extend(fields);
            Ok(resource.clone())
        })
        .await
    }

    // ========== Credentials ==========

    pub async fn add_credential(
        &self,
        user_id: i64,
        provider: Provider,
        name: impl Into<String>,
        encrypted_data: impl Into<String>,
    ) -> Result<CloudCredential> {
        let name = name.into();
        let encrypted_data = encrypted_data.into();
        self.mutate(|t| {
            let id = t.allocate_id();
            let credential = CloudCredential {
                id,
                user_id,
                provider,
                name,
                encrypted_data,
                created_at: Utc::now(),
            };
            t.credentials.insert(id, credential.clone());
            Ok(credential)
        })
        .await
    }

    pub async fn get_credential(&self, id: i64) -> Result<Option<CloudCredential>> {
        Ok(self.tables.read().await.credentials.get(&id).cloned())
    }

    pub async fn delete_credential(&self, id: i64) -> Result<()> {
        self.mutate(|t| {
            t.credentials
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::CredentialNotFound(id))
        })
        .await
    }

    pub async fn credentials_for(&self, user_id: i64) -> Result<Vec<CloudCredential>> {
        Ok(self
            .tables
            .read()
            .await
            .credentials
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    pub async fn credentials_for_provider(
        &self,
        user_id: i64,
        provider: Provider,
    ) -> Result<Vec<CloudCredential>> {
        Ok(self
            .credentials_for(user_id)
            .await?
            .into_iter()
            .filter(|c| c.provider == provider)
            .collect())
    }

    /// Distinct users owning at least one credential
    pub async fn users_with_credentials(&self) -> Result<Vec<i64>> {
        let users: BTreeSet<i64> = self
            .tables
            .read()
            .await
            .credentials
            .values()
            .map(|c| c.user_id)
            .collect();
        Ok(users.into_iter().collect())
    }

    // ========== Inventory & Health ==========

    pub fn begin_sync(&self, user_id: i64) -> SyncTransaction {
        SyncTransaction {
            user_id,
            ops: Vec::new(),
        }
    }

    /// Apply every buffered write of `tx` in one step
    pub async fn commit_sync(&self, tx: SyncTransaction) -> Result<SyncStats> {
        let SyncTransaction { user_id, ops } = tx;
        self.mutate(|t| {
            let now = Utc::now();
            let mut stats = SyncStats::default();
            for op in ops {
                match op {
                    SyncOp::Inventory {
                        provider,
                        descriptor,
                    } => {
                        if t.upsert_inventory(user_id, provider, descriptor, now) {
                            stats.inserted += 1;
                        } else {
                            stats.updated += 1;
                        }
                    }
                    SyncOp::Health {
                        provider,
                        credential_id,
                        sample,
                    } => {
                        t.upsert_health(user_id, provider, credential_id, sample, now);
                        stats.health += 1;
                    }
                }
            }
            Ok(stats)
        })
        .await
    }

    pub async fn inventory_for(&self, user_id: i64) -> Result<Vec<ResourceInventory>> {
        Ok(self
            .tables
            .read()
            .await
            .inventory
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    pub async fn health_for(&self, user_id: i64) -> Result<Vec<ProviderHealth>> {
        Ok(self
            .tables
            .read()
            .await
            .health
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect())
    }
}
