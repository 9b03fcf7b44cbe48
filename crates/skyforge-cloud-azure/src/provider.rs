//! Azure provider adapter implementation

use crate::arm::{ArmClient, ResourceGroup, StorageAccount, VirtualMachine, resource_group_of};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::json;
use skyforge_cloud::{AzureCredentials, CloudError, Provider, ProviderAdapter, ResourceDescriptor};

/// Azure provider adapter
pub struct AzureAdapter {
    arm: ArmClient,
}

impl AzureAdapter {
    pub fn new(credentials: AzureCredentials) -> Result<Self> {
        Ok(Self {
            arm: ArmClient::new(credentials)?,
        })
    }

    pub fn with_client(arm: ArmClient) -> Self {
        Self { arm }
    }
}

pub(crate) fn vm_descriptor(vm: VirtualMachine, power_state: Option<String>) -> ResourceDescriptor {
    let resource_group = resource_group_of(&vm.id).unwrap_or("unknown").to_string();
    let mut descriptor = ResourceDescriptor::new(&vm.id, &vm.name, "vm")
        .with_status(power_state.unwrap_or_else(|| "unknown".to_string()))
        .with_region(&vm.location)
        .with_metadata("resource_group", json!(resource_group))
        .with_metadata("os_type", json!(vm.os_type().unwrap_or("unknown")))
        .with_metadata("vm_id", json!(vm.properties.vm_id))
        .with_tags(vm.tags.clone().unwrap_or_default());
    descriptor.instance_type = Some(vm.vm_size().unwrap_or("unknown").to_string());
    descriptor
}

pub(crate) fn storage_descriptor(account: StorageAccount) -> ResourceDescriptor {
    let resource_group = resource_group_of(&account.id).unwrap_or("unknown").to_string();
    let status = account
        .properties
        .status_of_primary
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    ResourceDescriptor::new(&account.id, &account.name, "storage")
        .with_status(status)
        .with_region(&account.location)
        .with_metadata("resource_group", json!(resource_group))
        .with_metadata(
            "sku",
            json!(account.sku.as_ref().map(|s| s.name.as_str()).unwrap_or("unknown")),
        )
        .with_metadata("kind", json!(account.kind.as_deref().unwrap_or("unknown")))
        .with_metadata("creation_time", json!(account.properties.creation_time))
        .with_tags(account.tags.unwrap_or_default())
}

pub(crate) fn resource_group_descriptor(group: ResourceGroup) -> ResourceDescriptor {
    let status = group
        .properties
        .provisioning_state
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    ResourceDescriptor::new(&group.id, &group.name, "resource_group")
        .with_status(status)
        .with_region(&group.location)
        .with_tags(group.tags.unwrap_or_default())
}

#[async_trait]
impl ProviderAdapter for AzureAdapter {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    async fn probe(&self) -> skyforge_cloud::Result<()> {
        self.arm.get_subscription().await.map_err(CloudError::from)
    }

    async fn list_instances(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let vms = self.arm.list_virtual_machines().await?;
        let mut descriptors = Vec::with_capacity(vms.len());

        for vm in vms {
            let power_state = match self.arm.power_state(&vm.id).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("Could not get instance view for {}: {}", vm.name, e);
                    None
                }
            };
            descriptors.push(vm_descriptor(vm, power_state));
        }

        tracing::info!("Listed {} Azure VMs", descriptors.len());
        Ok(descriptors)
    }

    async fn list_storage(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let accounts = self.arm.list_storage_accounts().await?;
        let descriptors: Vec<_> = accounts.into_iter().map(storage_descriptor).collect();
        tracing::info!("Listed {} Azure storage accounts", descriptors.len());
        Ok(descriptors)
    }

    async fn list_network(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let groups = self.arm.list_resource_groups().await?;
        let descriptors: Vec<_> = groups.into_iter().map(resource_group_descriptor).collect();
        tracing::info!("Listed {} Azure resource groups", descriptors.len());
        Ok(descriptors)
    }
}
