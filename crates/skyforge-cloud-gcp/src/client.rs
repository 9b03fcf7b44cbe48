//! Compute Engine and Cloud Storage REST client

use crate::auth::ServiceAccountAuth;
use crate::error::{GcpError, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use skyforge_cloud::GcpCredentials;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

const COMPUTE_BASE: &str = "https://compute.googleapis.com/compute/v1";
const STORAGE_BASE: &str = "https://storage.googleapis.com/storage/v1";

/// Upper bound for one HTTP round trip, token exchange included
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GcpClient {
    client: reqwest::Client,
    auth: ServiceAccountAuth,
    compute_base: String,
    storage_base: String,
}

impl GcpClient {
    pub fn new(credentials: GcpCredentials) -> Result<Self> {
        Self::with_timeout(credentials, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(credentials: GcpCredentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            auth: ServiceAccountAuth::new(client.clone(), credentials),
            client,
            compute_base: COMPUTE_BASE.to_string(),
            storage_base: STORAGE_BASE.to_string(),
        })
    }

    pub fn project_id(&self) -> &str {
        self.auth.project_id()
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let token = self.auth.access_token().await?;
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GcpError::ApiError {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Follow `nextPageToken` until the collection is exhausted
    async fn get_pages<P, T>(
        &self,
        url: &str,
        extra: &[(&str, &str)],
        mut take: impl FnMut(P) -> (Vec<T>, Option<String>),
    ) -> Result<Vec<T>>
    where
        P: DeserializeOwned,
    {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, &str)> = extra.to_vec();
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }

            let page: P = self.get_json(url, &query).await?;
            let (batch, next) = take(page);
            items.extend(batch);

            match next.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    /// List one zone; enough to prove the token and project are usable
    pub async fn list_one_zone(&self) -> Result<()> {
        let url = format!("{}/projects/{}/zones", self.compute_base, self.project_id());
        let _: Value = self.get_json(&url, &[("maxResults", "1")]).await?;
        Ok(())
    }

    /// Instances across every zone, paired with the zone they live in
    pub async fn aggregated_instances(&self) -> Result<Vec<(String, GcpInstance)>> {
        let url = format!(
            "{}/projects/{}/aggregated/instances",
            self.compute_base,
            self.project_id()
        );
        self.get_pages(&url, &[], |page: AggregatedInstances| {
            (flatten_aggregated(page.items), page.next_page_token)
        })
        .await
    }

    pub async fn list_buckets(&self) -> Result<Vec<GcpBucket>> {
        let url = format!("{}/b", self.storage_base);
        let project = self.project_id().to_string();
        self.get_pages(&url, &[("project", project.as_str())], |page: ItemPage<GcpBucket>| {
            (page.items, page.next_page_token)
        })
        .await
    }

    pub async fn list_networks(&self) -> Result<Vec<GcpNetwork>> {
        let url = format!("{}/projects/{}/global/networks", self.compute_base, self.project_id());
        self.get_pages(&url, &[], |page: ItemPage<GcpNetwork>| {
            (page.items, page.next_page_token)
        })
        .await
    }
}

fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str))
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string())
}

/// "zones/us-central1-a" -> "us-central1-a"
pub(crate) fn flatten_aggregated(
    items: HashMap<String, InstancesScopedList>,
) -> Vec<(String, GcpInstance)> {
    let mut out: Vec<(String, GcpInstance)> = items
        .into_iter()
        .flat_map(|(scope, list)| {
            let zone = scope.rsplit('/').next().unwrap_or(&scope).to_string();
            list.instances
                .into_iter()
                .map(move |instance| (zone.clone(), instance))
        })
        .collect();
    out.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
    out
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemPage<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AggregatedInstances {
    #[serde(default)]
    pub(crate) items: HashMap<String, InstancesScopedList>,
    pub(crate) next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InstancesScopedList {
    #[serde(default)]
    pub(crate) instances: Vec<GcpInstance>,
}

/// Compute Engine instance (subset of fields)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpInstance {
    /// uint64 encoded as a JSON string by the API
    pub id: Value,
    pub name: String,
    pub status: Option<String>,
    pub machine_type: Option<String>,
    pub creation_timestamp: Option<String>,
    pub self_link: Option<String>,

    #[serde(default)]
    pub network_interfaces: Vec<NetworkInterface>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(rename = "networkIP")]
    pub network_ip: Option<String>,

    #[serde(default)]
    pub access_configs: Vec<AccessConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessConfig {
    #[serde(rename = "natIP")]
    pub nat_ip: Option<String>,
}

/// Cloud Storage bucket (subset of fields)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpBucket {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub storage_class: Option<String>,
    pub time_created: Option<String>,
    pub self_link: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// VPC network (subset of fields)
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcpNetwork {
    pub id: Value,
    pub name: String,
    pub auto_create_subnetworks: Option<bool>,
    pub creation_timestamp: Option<String>,
    pub self_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_aggregated_skips_empty_zones() {
        let page: AggregatedInstances = serde_json::from_str(
            r#"{
                "items": {
                    "zones/us-central1-a": {"instances": [{"id": "1", "name": "b"}, {"id": "2", "name": "a"}]},
                    "zones/europe-west1-b": {"warning": {"code": "NO_RESULTS_ON_PAGE"}}
                },
                "nextPageToken": "t2"
            }"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("t2"));

        let flat = flatten_aggregated(page.items);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].0, "us-central1-a");
        assert_eq!(flat[0].1.name, "a");
    }

    #[test]
    fn test_bucket_page() {
        let page: ItemPage<GcpBucket> = serde_json::from_str(
            r#"{"items": [{"id": "logs", "name": "logs", "location": "EU", "labels": {"env": "dev"}}]}"#,
        )
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.next_page_token.is_none());
        assert_eq!(page.items[0].labels["env"], "dev");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(r#"{"error": {"code": 403, "message": "Compute Engine API has not been used"}}"#),
            "Compute Engine API has not been used"
        );
    }
}
