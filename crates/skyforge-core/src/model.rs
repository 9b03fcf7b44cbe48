//! Records persisted by the state store

use crate::error::UnknownProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Free-form JSON object used for resource configuration and tool output
pub type OutputMap = serde_json::Map<String, serde_json::Value>;

/// Supported cloud providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Aws,
    Azure,
    Gcp,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Aws, Provider::Azure, Provider::Gcp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aws" => Ok(Provider::Aws),
            "azure" => Ok(Provider::Azure),
            "gcp" => Ok(Provider::Gcp),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Lifecycle of a provisioned resource
///
/// `pending -> provisioning -> {active, failed}`. A resource whose job could
/// not be enqueued moves straight from `pending` to `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Provisioning,
    Active,
    Failed,
}

impl ResourceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResourceStatus::Active | ResourceStatus::Failed)
    }

    pub fn can_transition_to(&self, next: ResourceStatus) -> bool {
        use ResourceStatus::*;
        matches!(
            (*self, next),
            (Pending, Provisioning)
                | (Pending, Failed)
                | (Provisioning, Active)
                | (Provisioning, Failed)
        )
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceStatus::Pending => write!(f, "pending"),
            ResourceStatus::Provisioning => write!(f, "provisioning"),
            ResourceStatus::Active => write!(f, "active"),
            ResourceStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Grouping of resources owned by one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A resource the user asked to have provisioned
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub provider: Provider,

    /// Resource type (e.g., "vm", "storage")
    pub resource_type: String,

    pub status: ResourceStatus,

    /// User supplied configuration, passed through to the IaC module
    pub configuration: OutputMap,

    /// Tool logs plus whatever structured fields could be parsed
    pub terraform_output: Option<OutputMap>,

    pub created_at: DateTime<Utc>,
}

impl Resource {
    /// Accumulated tool logs, empty when nothing ran yet
    pub fn logs(&self) -> &str {
        self.terraform_output
            .as_ref()
            .and_then(|o| o.get("logs"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }
}

/// Input for creating a resource record
#[derive(Debug, Clone)]
pub struct NewResource {
    pub project_id: i64,
    pub name: String,
    pub provider: Provider,
    pub resource_type: String,
    pub configuration: OutputMap,
}

/// Encrypted provider credential. Only the ciphertext is ever persisted.
#[derive(Clone, Serialize, Deserialize)]
pub struct CloudCredential {
    pub id: i64,
    pub user_id: i64,
    pub provider: Provider,

    /// Display name (e.g., "prod account")
    pub name: String,

    pub encrypted_data: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for CloudCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudCredential")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Normalized resource record returned by a provider listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Provider-native identifier
    pub resource_id: String,
    pub resource_name: String,

    /// e.g. "vm", "storage", "vpc", "network", "resource_group"
    pub resource_type: String,

    pub status: String,
    pub region: String,
    pub instance_type: Option<String>,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub metadata: OutputMap,
    pub tags: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(
        resource_id: impl Into<String>,
        resource_name: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_name: resource_name.into(),
            resource_type: resource_type.into(),
            status: "unknown".to_string(),
            region: "unknown".to_string(),
            instance_type: None,
            public_ip: None,
            private_ip: None,
            metadata: OutputMap::new(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if !value.is_null() {
            self.metadata.insert(key.into(), value);
        }
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Cached view of a live provider resource. Safe to rebuild at any time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInventory {
    pub id: i64,
    pub user_id: i64,
    pub provider: Provider,
    pub resource_type: String,
    pub resource_id: String,
    pub resource_name: String,
    pub region: String,
    pub status: String,
    pub instance_type: Option<String>,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub metadata: OutputMap,
    pub tags: BTreeMap<String, String>,
    /// Reserved for a billing source. Sync never fills it, so it is left out
    /// of serialized rows until something does.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_per_hour: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

/// Connectivity classification of a provider account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Error,
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Error => write!(f, "error"),
            HealthStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// One probe result, before it is stamped and stored
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSample {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
}

/// Last known connectivity status, one row per (user, provider, credential)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    pub user_id: i64,
    pub provider: Provider,
    pub credential_id: i64,
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub last_check_at: DateTime<Utc>,
}
