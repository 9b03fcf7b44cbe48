//! AWS provider adapter implementation

use crate::awscli::{AwsCli, Bucket, Ec2Instance, Tag, Vpc, tag_value};
use async_trait::async_trait;
use serde_json::json;
use skyforge_cloud::{
    AwsCredentials, CloudError, Provider, ProviderAdapter, ResourceDescriptor,
};
use std::collections::BTreeMap;

/// AWS provider adapter
pub struct AwsAdapter {
    cli: AwsCli,
}

impl AwsAdapter {
    pub fn new(credentials: &AwsCredentials) -> Self {
        Self {
            cli: AwsCli::new(credentials),
        }
    }

    pub fn with_cli(cli: AwsCli) -> Self {
        Self { cli }
    }
}

fn tag_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

/// "us-east-1a" -> "us-east-1"
fn region_of_zone(zone: &str) -> String {
    zone.trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .to_string()
}

pub(crate) fn instance_descriptor(
    instance: Ec2Instance,
    fallback_region: &str,
) -> ResourceDescriptor {
    let region = instance
        .availability_zone()
        .map(region_of_zone)
        .unwrap_or_else(|| fallback_region.to_string());
    let name = instance
        .name_tag()
        .unwrap_or(&instance.instance_id)
        .to_string();
    let status = instance
        .state
        .as_ref()
        .map(|s| s.name.clone())
        .unwrap_or_else(|| "unknown".to_string());

    let mut descriptor = ResourceDescriptor::new(&instance.instance_id, name, "vm")
        .with_status(status)
        .with_region(region)
        .with_metadata("ami_id", json!(instance.image_id))
        .with_metadata("launch_time", json!(instance.launch_time))
        .with_metadata("vpc_id", json!(instance.vpc_id))
        .with_metadata("subnet_id", json!(instance.subnet_id))
        .with_metadata("availability_zone", json!(instance.availability_zone()))
        .with_metadata(
            "platform",
            json!(instance.platform.as_deref().unwrap_or("linux")),
        )
        .with_tags(tag_map(&instance.tags));
    descriptor.instance_type = instance.instance_type;
    descriptor.public_ip = instance.public_ip_address;
    descriptor.private_ip = instance.private_ip_address;
    descriptor
}

pub(crate) fn bucket_descriptor(bucket: Bucket, region: String) -> ResourceDescriptor {
    ResourceDescriptor::new(&bucket.name, &bucket.name, "storage")
        .with_status("active")
        .with_region(region)
        .with_metadata("creation_date", json!(bucket.creation_date))
        .with_metadata("bucket_type", json!("s3"))
}

pub(crate) fn vpc_descriptor(vpc: Vpc, region: &str) -> ResourceDescriptor {
    let name = tag_value(&vpc.tags, "Name")
        .unwrap_or(&vpc.vpc_id)
        .to_string();
    ResourceDescriptor::new(&vpc.vpc_id, name, "vpc")
        .with_status(vpc.state.clone().unwrap_or_else(|| "unknown".to_string()))
        .with_region(region)
        .with_metadata("cidr_block", json!(vpc.cidr_block))
        .with_metadata("is_default", json!(vpc.is_default))
        .with_tags(tag_map(&vpc.tags))
}

#[async_trait]
impl ProviderAdapter for AwsAdapter {
    fn provider(&self) -> Provider {
        Provider::Aws
    }

    async fn probe(&self) -> skyforge_cloud::Result<()> {
        self.cli.describe_regions().await.map_err(CloudError::from)
    }

    async fn list_instances(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let instances = self.cli.describe_instances().await?;
        let region = self.cli.region();
        let descriptors: Vec<_> = instances
            .into_iter()
            .map(|i| instance_descriptor(i, region))
            .collect();
        tracing::info!("Listed {} EC2 instances", descriptors.len());
        Ok(descriptors)
    }

    async fn list_storage(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let buckets = self.cli.list_buckets().await?;
        let mut descriptors = Vec::with_capacity(buckets.len());

        for bucket in buckets {
            match self.cli.bucket_location(&bucket.name).await {
                Ok(region) => descriptors.push(bucket_descriptor(bucket, region)),
                Err(e) => {
                    tracing::warn!("Could not get location for bucket {}: {}", bucket.name, e);
                }
            }
        }

        tracing::info!("Listed {} S3 buckets", descriptors.len());
        Ok(descriptors)
    }

    async fn list_network(&self) -> skyforge_cloud::Result<Vec<ResourceDescriptor>> {
        let vpcs = self.cli.describe_vpcs().await?;
        let region = self.cli.region();
        let descriptors: Vec<_> = vpcs.into_iter().map(|v| vpc_descriptor(v, region)).collect();
        tracing::info!("Listed {} VPCs", descriptors.len());
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awscli::{InstanceState, Placement, parse_instances};

    #[test]
    fn test_region_of_zone() {
        assert_eq!(region_of_zone("us-east-1a"), "us-east-1");
        assert_eq!(region_of_zone("ap-south-1c"), "ap-south-1");
    }

    #[test]
    fn test_instance_descriptor() {
        let output = r#"{"Reservations": [{"Instances": [{
            "InstanceId": "i-0abc", "InstanceType": "t3.medium", "ImageId": "ami-1",
            "State": {"Name": "running"},
            "Placement": {"AvailabilityZone": "eu-west-1b"},
            "PublicIpAddress": "54.1.2.3", "PrivateIpAddress": "10.0.0.4",
            "Tags": [{"Key": "Name", "Value": "api"}, {"Key": "env", "Value": "prod"}]
        }]}]}"#;
        let instance = parse_instances(output).unwrap().remove(0);

        let d = instance_descriptor(instance, "us-east-1");
        assert_eq!(d.resource_id, "i-0abc");
        assert_eq!(d.resource_name, "api");
        assert_eq!(d.resource_type, "vm");
        assert_eq!(d.status, "running");
        assert_eq!(d.region, "eu-west-1");
        assert_eq!(d.instance_type.as_deref(), Some("t3.medium"));
        assert_eq!(d.public_ip.as_deref(), Some("54.1.2.3"));
        assert_eq!(d.tags.get("env").map(String::as_str), Some("prod"));
        assert_eq!(d.metadata["platform"], "linux");
        assert!(!d.metadata.contains_key("vpc_id"));
    }

    #[test]
    fn test_instance_without_name_tag_uses_id() {
        let instance = Ec2Instance {
            instance_id: "i-9".to_string(),
            instance_type: None,
            image_id: None,
            launch_time: None,
            state: Some(InstanceState {
                name: "pending".to_string(),
            }),
            placement: Some(Placement {
                availability_zone: None,
            }),
            public_ip_address: None,
            private_ip_address: None,
            vpc_id: None,
            subnet_id: None,
            platform: None,
            tags: Vec::new(),
        };

        let d = instance_descriptor(instance, "ap-south-1");
        assert_eq!(d.resource_name, "i-9");
        assert_eq!(d.region, "ap-south-1");
    }

    #[test]
    fn test_vpc_descriptor() {
        let vpc = Vpc {
            vpc_id: "vpc-1".to_string(),
            state: Some("available".to_string()),
            cidr_block: Some("10.0.0.0/16".to_string()),
            is_default: true,
            tags: Vec::new(),
        };

        let d = vpc_descriptor(vpc, "us-west-2");
        assert_eq!(d.resource_type, "vpc");
        assert_eq!(d.resource_name, "vpc-1");
        assert_eq!(d.metadata["is_default"], true);
    }
}
