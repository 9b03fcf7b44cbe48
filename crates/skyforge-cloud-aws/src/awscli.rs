//! aws CLI wrapper
//!
//! Wraps the aws CLI commands needed for inventory reconciliation.

use crate::error::{AwsError, Result};
use serde::{Deserialize, Serialize};
use skyforge_cloud::{AwsCredentials, CredentialEnv, ProviderCredentials};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// aws CLI wrapper
pub struct AwsCli {
    binary: String,
    region: String,
    env: CredentialEnv,
}

impl AwsCli {
    pub fn new(credentials: &AwsCredentials) -> Self {
        let region = credentials.region().to_string();
        Self {
            binary: "aws".to_string(),
            region,
            env: ProviderCredentials::Aws(credentials.clone()).tool_env(),
        }
    }

    /// Use a different executable (e.g. an absolute path)
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Run an aws command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        cmd.arg("--region").arg(&self.region);
        cmd.arg("--output").arg("json");
        cmd.env("AWS_PAGER", "");
        self.env.apply(&mut cmd);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: aws {} --region {}", args.join(" "), self.region);

        let output = match tokio::time::timeout(COMMAND_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AwsError::AwsCliNotFound);
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(AwsError::Timeout(COMMAND_TIMEOUT.as_secs())),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AwsError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Cheapest authenticated call available
    pub async fn describe_regions(&self) -> Result<()> {
        self.run_command(&["ec2", "describe-regions", "--query", "Regions[0].RegionName"])
            .await?;
        Ok(())
    }

    /// List all EC2 instances in the region
    pub async fn describe_instances(&self) -> Result<Vec<Ec2Instance>> {
        let output = self.run_command(&["ec2", "describe-instances"]).await?;
        parse_instances(&output)
    }

    /// List all S3 buckets of the account
    pub async fn list_buckets(&self) -> Result<Vec<Bucket>> {
        let output = self.run_command(&["s3api", "list-buckets"]).await?;
        if output.trim().is_empty() {
            return Ok(Vec::new());
        }
        let response: ListBucketsResponse = serde_json::from_str(&output)?;
        Ok(response.buckets)
    }

    /// Region a bucket lives in. A null constraint means us-east-1.
    pub async fn bucket_location(&self, bucket: &str) -> Result<String> {
        let output = self
            .run_command(&["s3api", "get-bucket-location", "--bucket", bucket])
            .await?;
        let response: BucketLocation = serde_json::from_str(&output)?;
        Ok(response
            .location_constraint
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "us-east-1".to_string()))
    }

    /// List all VPCs in the region
    pub async fn describe_vpcs(&self) -> Result<Vec<Vpc>> {
        let output = self.run_command(&["ec2", "describe-vpcs"]).await?;
        if output.trim().is_empty() {
            return Ok(Vec::new());
        }
        let response: DescribeVpcsResponse = serde_json::from_str(&output)?;
        Ok(response.vpcs)
    }
}

pub(crate) fn parse_instances(output: &str) -> Result<Vec<Ec2Instance>> {
    if output.trim().is_empty() {
        return Ok(Vec::new());
    }
    let response: DescribeInstancesResponse = serde_json::from_str(output)?;
    Ok(response
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .collect())
}

#[derive(Debug, Deserialize)]
struct DescribeInstancesResponse {
    #[serde(rename = "Reservations", default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
struct Reservation {
    #[serde(rename = "Instances", default)]
    instances: Vec<Ec2Instance>,
}

/// EC2 instance as reported by describe-instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ec2Instance {
    #[serde(rename = "InstanceId")]
    pub instance_id: String,

    #[serde(rename = "InstanceType")]
    pub instance_type: Option<String>,

    #[serde(rename = "ImageId")]
    pub image_id: Option<String>,

    #[serde(rename = "LaunchTime")]
    pub launch_time: Option<String>,

    #[serde(rename = "State")]
    pub state: Option<InstanceState>,

    #[serde(rename = "Placement")]
    pub placement: Option<Placement>,

    #[serde(rename = "PublicIpAddress")]
    pub public_ip_address: Option<String>,

    #[serde(rename = "PrivateIpAddress")]
    pub private_ip_address: Option<String>,

    #[serde(rename = "VpcId")]
    pub vpc_id: Option<String>,

    #[serde(rename = "SubnetId")]
    pub subnet_id: Option<String>,

    #[serde(rename = "Platform")]
    pub platform: Option<String>,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<Tag>,
}

impl Ec2Instance {
    pub fn availability_zone(&self) -> Option<&str> {
        self.placement
            .as_ref()
            .and_then(|p| p.availability_zone.as_deref())
    }

    pub fn name_tag(&self) -> Option<&str> {
        tag_value(&self.tags, "Name")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceState {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    #[serde(rename = "AvailabilityZone")]
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Value", default)]
    pub value: String,
}

pub(crate) fn tag_value<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.key == key)
        .map(|t| t.value.as_str())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct ListBucketsResponse {
    #[serde(rename = "Buckets", default)]
    buckets: Vec<Bucket>,
}

/// S3 bucket as reported by list-buckets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "CreationDate")]
    pub creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BucketLocation {
    #[serde(rename = "LocationConstraint")]
    location_constraint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DescribeVpcsResponse {
    #[serde(rename = "Vpcs", default)]
    vpcs: Vec<Vpc>,
}

/// VPC as reported by describe-vpcs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vpc {
    #[serde(rename = "VpcId")]
    pub vpc_id: String,

    #[serde(rename = "State")]
    pub state: Option<String>,

    #[serde(rename = "CidrBlock")]
    pub cidr_block: Option<String>,

    #[serde(rename = "IsDefault", default)]
    pub is_default: bool,

    #[serde(rename = "Tags", default)]
    pub tags: Vec<Tag>,
}
