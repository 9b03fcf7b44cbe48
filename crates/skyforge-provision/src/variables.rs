//! Translation of a resource's raw configuration into module variables
//!
//! Rules are per module and total: every required variable ends up with a
//! user value, a default, or a value derived from the resource itself.
//! Anything that cannot be resolved is a validation failure.

use crate::error::{ProvisionError, Result};
use serde_json::{Value, json};
use skyforge_core::{OutputMap, Provider};

const DEFAULT_AWS_REGION: &str = "us-east-1";
const DEFAULT_AWS_INSTANCE_TYPE: &str = "t3.micro";
const DEFAULT_AZURE_VM_SIZE: &str = "Standard_B1s";
const DEFAULT_GCP_REGION: &str = "us-central1";
const DEFAULT_GCP_MACHINE_TYPE: &str = "e2-micro";
const DEFAULT_GCP_STORAGE_LOCATION: &str = "US";

/// Ubuntu 20.04 images per region
const AWS_AMIS: [(&str, &str); 5] = [
    ("us-east-1", "ami-0c02fb55956c7d316"),
    ("us-west-2", "ami-0892d3c7ee96c0bf7"),
    ("ap-south-1", "ami-0f5ee92e2d63afc18"),
    ("eu-west-1", "ami-08f312f60f5433162"),
    ("ap-southeast-1", "ami-047126e50991d067b"),
];

const BUCKET_NAME_MAX: usize = 63;
const STORAGE_ACCOUNT_MAX: usize = 24;

/// Module name for a (provider, resource type) pair
pub fn module_for(provider: Provider, resource_type: &str) -> String {
    match (provider, resource_type) {
        (Provider::Aws, "vm") => "aws_vm".to_string(),
        (Provider::Aws, "storage") => "aws_s3".to_string(),
        (Provider::Azure, "vm") => "azure_vm".to_string(),
        (Provider::Azure, "storage") => "azure_blob".to_string(),
        (Provider::Gcp, "vm") => "gcp_vm".to_string(),
        (Provider::Gcp, "storage") => "gcp_storage".to_string(),
        (provider, other) => format!("{}_{}", provider, other),
    }
}

pub fn default_ami(region: &str) -> &'static str {
    AWS_AMIS
        .iter()
        .find(|(r, _)| *r == region)
        .or_else(|| AWS_AMIS.first())
        .map(|(_, ami)| *ami)
        .unwrap_or_default()
}

/// What the rules may derive names from
#[derive(Debug, Clone)]
pub struct VariableContext<'a> {
    pub resource_id: i64,
    pub resource_name: &'a str,
    pub prefix: &'a str,
}

impl VariableContext<'_> {
    fn resource_group(&self) -> String {
        format!("{}-rg-{}", self.prefix, self.resource_id)
    }

    /// `<prefix>-<slug(name)>-<id>`, shortened to a valid bucket name
    fn bucket_name(&self) -> String {
        let suffix = format!("-{}", self.resource_id);
        let mut head = format!("{}-{}", slug(self.prefix), slug(self.resource_name));
        head.truncate(BUCKET_NAME_MAX.saturating_sub(suffix.len()));
        format!("{}{}", head.trim_end_matches('-'), suffix)
    }

    /// Lowercase alphanumerics only, id kept intact at the end
    fn storage_account_name(&self) -> String {
        let suffix = self.resource_id.to_string();
        let mut head: String = self
            .prefix
            .chars()
            .chain(self.resource_name.chars())
            .filter(char::is_ascii_alphanumeric)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        head.truncate(STORAGE_ACCOUNT_MAX.saturating_sub(suffix.len()));
        format!("{}{}", head, suffix)
    }
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// Trimmed string value; blank strings and nulls count as unset
fn text(vars: &OutputMap, key: &str) -> Option<String> {
    match vars.get(key)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Null => None,
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn set_default(vars: &mut OutputMap, key: &str, default: impl FnOnce() -> String) {
    let value = text(vars, key).unwrap_or_else(default);
    vars.insert(key.to_string(), json!(value));
}

/// Normalize a trimmed optional string, dropping it when blank
fn trim_optional(vars: &mut OutputMap, key: &str) {
    match text(vars, key) {
        Some(value) => {
            vars.insert(key.to_string(), json!(value));
        }
        None => {
            vars.remove(key);
        }
    }
}

/// Move `from` to `to` unless `to` is already set
fn rename(vars: &mut OutputMap, from: &str, to: &str) {
    if let Some(value) = vars.remove(from) {
        if text(vars, to).is_none() {
            vars.insert(to.to_string(), value);
        }
    }
}

/// "sg-1, sg-2" or ["sg-1", " sg-2 "] -> ["sg-1", "sg-2"]
fn id_list(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn require(module: &str, vars: &OutputMap, keys: &[&str]) -> Result<()> {
    let missing: Vec<&str> = keys
        .iter()
        .copied()
        .filter(|k| text(vars, k).is_none())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::Validation {
            module: module.to_string(),
            reason: format!("missing required variable(s): {}", missing.join(", ")),
        })
    }
}

/// Translate `raw` into the variable file for `module`
pub fn translate(module: &str, ctx: &VariableContext<'_>, raw: &OutputMap) -> Result<OutputMap> {
    let mut vars = raw.clone();

    match module {
        "aws_vm" => {
            set_default(&mut vars, "region", || DEFAULT_AWS_REGION.to_string());
            set_default(&mut vars, "instance_name", || ctx.resource_name.to_string());
            set_default(&mut vars, "instance_type", || {
                DEFAULT_AWS_INSTANCE_TYPE.to_string()
            });
            let region = text(&vars, "region").unwrap_or_default();
            set_default(&mut vars, "ami", || default_ami(&region).to_string());
            trim_optional(&mut vars, "subnet_id");
            trim_optional(&mut vars, "key_name");

            let mut groups = vars
                .remove("security_groups")
                .map(|v| id_list(&v))
                .unwrap_or_default();
            if let Some(existing) = vars.remove("vpc_security_group_ids") {
                groups.extend(id_list(&existing));
            }
            if !groups.is_empty() {
                groups.dedup();
                vars.insert("vpc_security_group_ids".to_string(), json!(groups));
            }

            require(module, &vars, &["region", "instance_name", "instance_type", "ami"])?;
        }
        "aws_s3" => {
            set_default(&mut vars, "region", || DEFAULT_AWS_REGION.to_string());
            set_default(&mut vars, "bucket_name", || ctx.bucket_name());
            require(module, &vars, &["region", "bucket_name"])?;
        }
        "azure_vm" => {
            rename(&mut vars, "region", "location");
            trim_optional(&mut vars, "location");
            set_default(&mut vars, "vm_name", || ctx.resource_name.to_string());
            set_default(&mut vars, "resource_group_name", || ctx.resource_group());
            set_default(&mut vars, "vm_size", || DEFAULT_AZURE_VM_SIZE.to_string());
            require(
                module,
                &vars,
                &["location", "vm_name", "resource_group_name", "vm_size"],
            )?;
        }
        "azure_blob" => {
            rename(&mut vars, "region", "location");
            trim_optional(&mut vars, "location");
            set_default(&mut vars, "resource_group_name", || ctx.resource_group());
            set_default(&mut vars, "storage_account_name", || {
                ctx.storage_account_name()
            });
            require(
                module,
                &vars,
                &["location", "resource_group_name", "storage_account_name"],
            )?;
        }
        "gcp_vm" => {
            set_default(&mut vars, "region", || DEFAULT_GCP_REGION.to_string());
            let region = text(&vars, "region").unwrap_or_default();
            set_default(&mut vars, "zone", || format!("{}-a", region));
            set_default(&mut vars, "instance_name", || ctx.resource_name.to_string());
            set_default(&mut vars, "machine_type", || {
                DEFAULT_GCP_MACHINE_TYPE.to_string()
            });
            require(module, &vars, &["zone", "instance_name", "machine_type"])?;
        }
        "gcp_storage" => {
            rename(&mut vars, "region", "location");
            set_default(&mut vars, "location", || {
                DEFAULT_GCP_STORAGE_LOCATION.to_string()
            });
            set_default(&mut vars, "bucket_name", || ctx.bucket_name());
            require(module, &vars, &["bucket_name", "location"])?;
        }
        other => {
            tracing::debug!("No variable rules for module {}, passing through", other);
        }
    }

    Ok(vars)
}
