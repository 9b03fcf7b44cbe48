//! Azure Resource Manager REST client
//!
//! Bearer tokens come from the Microsoft identity platform's
//! client-credentials grant and are fetched lazily, once per client.

use crate::error::{AzureError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use skyforge_cloud::AzureCredentials;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::OnceCell;

const ARM_BASE: &str = "https://management.azure.com";
const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const ARM_SCOPE: &str = "https://management.azure.com/.default";

/// Upper bound for one HTTP round trip, token requests included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const COMPUTE_API_VERSION: &str = "2023-07-01";
const STORAGE_API_VERSION: &str = "2023-01-01";
const RESOURCES_API_VERSION: &str = "2021-04-01";
const SUBSCRIPTION_API_VERSION: &str = "2020-01-01";

/// ARM client bound to one subscription
pub struct ArmClient {
    client: reqwest::Client,
    credentials: AzureCredentials,
    token: OnceCell<String>,
    arm_base: String,
    login_base: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,

    #[serde(rename = "nextLink")]
    next_link: Option<String>,
}

impl ArmClient {
    pub fn new(credentials: AzureCredentials) -> Result<Self> {
        Self::with_timeout(credentials, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(credentials: AzureCredentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
            token: OnceCell::new(),
            arm_base: ARM_BASE.to_string(),
            login_base: LOGIN_BASE.to_string(),
        })
    }

    /// Point the client at different endpoints (sovereign clouds, test servers)
    pub fn with_endpoints(
        mut self,
        arm_base: impl Into<String>,
        login_base: impl Into<String>,
    ) -> Self {
        self.arm_base = arm_base.into();
        self.login_base = login_base.into();
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.credentials.subscription_id
    }

    async fn token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let url = format!(
                    "{}/{}/oauth2/v2.0/token",
                    self.login_base, self.credentials.tenant_id
                );
                let form = [
                    ("grant_type", "client_credentials"),
                    ("client_id", self.credentials.client_id.as_str()),
                    ("client_secret", self.credentials.client_secret.as_str()),
                    ("scope", ARM_SCOPE),
                ];

                tracing::debug!("Requesting ARM token for tenant {}", self.credentials.tenant_id);
                let response = self.client.post(&url).form(&form).send().await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AzureError::AuthenticationFailed(format!(
                        "{}: {}",
                        status,
                        error_message(&body)
                    )));
                }

                let token: TokenResponse = response.json().await?;
                Ok::<_, AzureError>(token.access_token)
            })
            .await?;
        Ok(token.as_str())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self.token().await?;
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AzureError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Follow `nextLink` until the collection is exhausted
    async fn get_all<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url);

        while let Some(url) = next {
            let page: Page<T> = self.get_json(&url).await?;
            items.extend(page.value);
            next = page.next_link.filter(|l| !l.is_empty());
        }

        Ok(items)
    }

    /// GET the subscription itself
    pub async fn get_subscription(&self) -> Result<()> {
        let url = format!(
            "{}/subscriptions/{}?api-version={}",
            self.arm_base,
            self.subscription_id(),
            SUBSCRIPTION_API_VERSION
        );
        let _: Value = self.get_json(&url).await?;
        Ok(())
    }

    pub async fn list_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.Compute/virtualMachines?api-version={}",
            self.arm_base,
            self.subscription_id(),
            COMPUTE_API_VERSION
        );
        self.get_all(url).await
    }

    /// Power state of a VM ("running", "deallocated", ...)
    pub async fn power_state(&self, vm_id: &str) -> Result<Option<String>> {
        let url = format!(
            "{}{}/instanceView?api-version={}",
            self.arm_base, vm_id, COMPUTE_API_VERSION
        );
        let view: InstanceView = self.get_json(&url).await?;
        Ok(view.power_state())
    }

    pub async fn list_storage_accounts(&self) -> Result<Vec<StorageAccount>> {
        let url = format!(
            "{}/subscriptions/{}/providers/Microsoft.Storage/storageAccounts?api-version={}",
            self.arm_base,
            self.subscription_id(),
            STORAGE_API_VERSION
        );
        self.get_all(url).await
    }

    pub async fn list_resource_groups(&self) -> Result<Vec<ResourceGroup>> {
        let url = format!(
            "{}/subscriptions/{}/resourcegroups?api-version={}",
            self.arm_base,
            self.subscription_id(),
            RESOURCES_API_VERSION
        );
        self.get_all(url).await
    }
}

/// Pull `error.message` out of an ARM or AAD error body, falling back to the raw text
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("error_description"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Resource group segment of an ARM id
pub fn resource_group_of(resource_id: &str) -> Option<&str> {
    let mut parts = resource_id.split('/');
    while let Some(part) = parts.next() {
        if part.eq_ignore_ascii_case("resourceGroups") {
            return parts.next().filter(|p| !p.is_empty());
        }
    }
    None
}

#[derive(Debug, Clone, Deserialize)]
pub struct VirtualMachine {
    pub id: String,
    pub name: String,
    pub location: String,

    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub properties: VmProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    pub vm_id: Option<String>,
    pub hardware_profile: Option<HardwareProfile>,
    pub storage_profile: Option<StorageProfile>,
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    pub os_disk: Option<OsDisk>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    pub os_type: Option<String>,
}

impl VirtualMachine {
    pub fn vm_size(&self) -> Option<&str> {
        self.properties
            .hardware_profile
            .as_ref()
            .and_then(|h| h.vm_size.as_deref())
    }

    pub fn os_type(&self) -> Option<&str> {
        self.properties
            .storage_profile
            .as_ref()
            .and_then(|s| s.os_disk.as_ref())
            .and_then(|d| d.os_type.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct InstanceView {
    #[serde(default)]
    statuses: Vec<InstanceStatus>,
}

#[derive(Debug, Deserialize)]
struct InstanceStatus {
    code: String,
}

impl InstanceView {
    fn power_state(&self) -> Option<String> {
        self.statuses
            .iter()
            .find_map(|s| s.code.strip_prefix("PowerState/"))
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageAccount {
    pub id: String,
    pub name: String,
    pub location: String,
    pub kind: Option<String>,
    pub sku: Option<Sku>,

    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub properties: StorageProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sku {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProperties {
    pub status_of_primary: Option<String>,
    pub creation_time: Option<String>,
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceGroup {
    pub id: String,
    pub name: String,
    pub location: String,

    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,

    #[serde(default)]
    pub properties: ResourceGroupProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    pub provisioning_state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_group_of() {
        let id = "/subscriptions/s/resourceGroups/web-rg/providers/Microsoft.Compute/virtualMachines/vm1";
        assert_eq!(resource_group_of(id), Some("web-rg"));
        assert_eq!(resource_group_of("/subscriptions/s/resourcegroups/lower"), Some("lower"));
        assert_eq!(resource_group_of("/subscriptions/s"), None);
    }

    #[test]
    fn test_power_state_from_instance_view() {
        let view: InstanceView = serde_json::from_str(
            r#"{"statuses": [
                {"code": "ProvisioningState/succeeded"},
                {"code": "PowerState/deallocated"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(view.power_state().as_deref(), Some("deallocated"));

        let empty: InstanceView = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.power_state(), None);
    }

    #[test]
    fn test_page_with_next_link() {
        let page: Page<ResourceGroup> = serde_json::from_str(
            r#"{"value": [{"id": "/subscriptions/s/resourceGroups/a", "name": "a",
                           "location": "westeurope",
                           "properties": {"provisioningState": "Succeeded"}}],
                "nextLink": "https://management.azure.com/next"}"#,
        )
        .unwrap();
        assert_eq!(page.value.len(), 1);
        assert_eq!(page.next_link.as_deref(), Some("https://management.azure.com/next"));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"error": {"code": "AuthorizationFailed", "message": "no access"}}"#),
            "no access"
        );
        assert_eq!(
            error_message(r#"{"error": "invalid_client", "error_description": "AADSTS7000215"}"#),
            "AADSTS7000215"
        );
        assert_eq!(error_message(" plain text "), "plain text");
    }
}
