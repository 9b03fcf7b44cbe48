//! GCP provider adapter implementation

use crate::client::{GcpBucket, GcpClient, GcpInstance, GcpNetwork};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use skyforge_cloud::{CloudError, GcpCredentials, Provider, ProviderAdapter, ResourceDescriptor};

/// GCP provider adapter
pub struct GcpAdapter {
    client: GcpClient,
}

impl GcpAdapter {
    pub fn new(credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            client: GcpClient::new(credentials)?,
        })
    }
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// "us-central1-a" -> "us-central1"
fn region_of_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, _)) if zone != "global" => region.to_string(),
        _ => zone.to_string(),
    }
}

pub(crate) fn instance_descriptor(zone: &str, instance: GcpInstance) -> ResourceDescriptor {
    let nic = instance.network_interfaces.first();
    let private_ip = nic.and_then(|n| n.network_ip.clone());
    let public_ip = nic
        .and_then(|n| n.access_configs.first())
        .and_then(|a| a.nat_ip.clone());
    let machine_type = instance
        .machine_type
        .as_deref()
        .and_then(|m| m.rsplit('/').next())
        .map(str::to_string);
    let status = instance
        .status
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_else(|| "unknown".to_string());

    let mut descriptor = ResourceDescriptor::new(id_string(&instance.id), &instance.name, "vm")
        .with_status(status)
        .with_region(region_of_zone(zone))
        .with_metadata("zone", json!(zone))
        .with_metadata("creation_timestamp", json!(instance.creation_timestamp))
        .with_metadata("self_link", json!(instance.self_link))
        .with_tags(instance.labels.clone());
    descriptor.instance_type = machine_type;
    descriptor.public_ip = public_ip;
    descriptor.private_ip = private_ip;
    descriptor
}

pub(crate) fn bucket_descriptor(bucket: GcpBucket) -> ResourceDescriptor {
    ResourceDescriptor::new(&bucket.id, &bucket.name, "storage")
        .with_status("active")
        .with_region(bucket.location.clone().unwrap_or_else(|| "unknown".to_string()))
        .with_metadata("storage_class", json!(bucket.storage_class))
        .with_metadata("time_created", json!(bucket.time_created))
        .with_metadata("self_link", json!(bucket.self_link))
        .with_tags(bucket.labels)
}

pub(crate) fn network_descriptor(network: GcpNetwork) -> ResourceDescriptor {
    ResourceDescriptor::new(id_string(&network.id), &network.name, "network")
        .with_status("active")
        .with_region("global")
        .with_metadata("auto_create_subnetworks", json!(network.auto_create_subnetworks))
        .with_metadata("creation_timestamp", json!(network.creation_timestamp))
        .with_metadata("self_link", json!(network.self_link))
}

#[async_trait]
impl ProviderAdapter for GcpAdapter {
    fn provider(&self) -> Provider {
        Provider::Gcp
    }

    async fn probe(&self) -> skyforge_cloud::Result<()> {
        self.client.list_one_zone().await.map_err(CloudError::from)
    }

    async fn list_instances(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let instances = self.client.aggregated_instances().await?;
        let descriptors: Vec<_> = instances
            .into_iter()
            .map(|(zone, instance)| instance_descriptor(&zone, instance))
            .collect();
        tracing::info!("Listed {} Compute Engine instances", descriptors.len());
        Ok(descriptors)
    }

    async fn list_storage(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let buckets = self.client.list_buckets().await?;
        let descriptors: Vec<_> = buckets.into_iter().map(bucket_descriptor).collect();
        tracing::info!("Listed {} Cloud Storage buckets", descriptors.len());
        Ok(descriptors)
    }

    async fn list_network(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let networks = self.client.list_networks().await?;
        let descriptors: Vec<_> = networks.into_iter().map(network_descriptor).collect();
        tracing::info!("Listed {} VPC networks", descriptors.len());
        Ok(descriptors)
    }
}
