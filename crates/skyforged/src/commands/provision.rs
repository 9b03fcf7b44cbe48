use crate::context::AppContext;
use anyhow::Context as _;
use colored::Colorize;
use serde_json::Value;
use skyforge_core::{NewResource, OutputMap, Provider, Resource, ResourceStatus, StateStore};
use skyforge_provision::Job;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Parse `key=value`. Values that are valid JSON keep their type.
pub fn parse_var(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

pub struct ProvisionRequest {
    pub user_id: i64,
    pub provider: Provider,
    pub resource_type: String,
    pub name: String,
    pub project: String,
    pub variables: Vec<(String, Value)>,
}

pub async fn handle(ctx: &AppContext, request: ProvisionRequest) -> anyhow::Result<()> {
    let project = ctx
        .store
        .create_project(request.user_id, &request.project)
        .await?;
    let configuration: OutputMap = request.variables.into_iter().collect();
    let resource = ctx
        .store
        .create_resource(NewResource {
            project_id: project.id,
            name: request.name,
            provider: request.provider,
            resource_type: request.resource_type,
            configuration,
        })
        .await?;

    println!(
        "{} {} {} '{}' (resource {})",
        "Provisioning".blue(),
        resource.provider.to_string().cyan(),
        resource.resource_type,
        resource.name,
        resource.id
    );

    let (queue, pool) = ctx.pipeline(1);
    queue
        .submit(Job::provision_resource(&resource))
        .await
        .context("Failed to queue provisioning job")?;

    let finished = wait_terminal(&ctx.store, resource.id).await?;
    drop(queue);
    pool.join().await;

    print_result(&finished);
    Ok(())
}

pub async fn destroy(ctx: &AppContext, resource_id: i64) -> anyhow::Result<()> {
    let resource = ctx
        .store
        .get_resource(resource_id)
        .await?
        .with_context(|| format!("Resource {} not found", resource_id))?;

    let status = ctx
        .orchestrator()
        .execute(Job::destroy_resource(&resource))
        .await
        .with_context(|| format!("Destroy of resource {} failed", resource_id))?;

    println!(
        "{} resource {} destroyed (record kept as {})",
        "✓".green(),
        resource_id,
        status
    );
    Ok(())
}

async fn wait_terminal(store: &StateStore, resource_id: i64) -> anyhow::Result<Resource> {
    loop {
        let resource = store
            .get_resource(resource_id)
            .await?
            .with_context(|| format!("Resource {} disappeared", resource_id))?;
        if resource.status.is_terminal() {
            return Ok(resource);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn print_result(resource: &Resource) {
    let output = resource.terraform_output.as_ref();
    let field = |key: &str| output.and_then(|o| o.get(key));

    match resource.status {
        ResourceStatus::Active => {
            println!("{} resource {} is active", "✓".green(), resource.id);
            if let Some(outputs) = field("outputs") {
                println!("{}", "Outputs:".bold());
                println!(
                    "{}",
                    serde_json::to_string_pretty(outputs).unwrap_or_default()
                );
            }
        }
        status => {
            println!("{} resource {} is {}", "✗".red(), resource.id, status);
            if let Some(Value::String(error)) = field("error") {
                println!("  {}: {}", "error".red(), error);
            }
            if let Some(Value::String(kind)) = field("error_kind") {
                println!("  {}: {}", "kind".dimmed(), kind);
            }
        }
    }

    let logs = resource.logs();
    if !logs.is_empty() {
        println!("{}", "─".repeat(60).dimmed());
        println!("{}", logs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_var_keeps_json_types() {
        assert_eq!(parse_var("count=2").unwrap(), ("count".to_string(), json!(2)));
        assert_eq!(
            parse_var("security_groups=[\"sg-1\",\"sg-2\"]").unwrap().1,
            json!(["sg-1", "sg-2"])
        );
        assert_eq!(
            parse_var("region=us-west-2").unwrap().1,
            json!("us-west-2")
        );
    }

    #[test]
    fn test_parse_var_splits_on_first_equals() {
        let (key, value) = parse_var("user_data=a=b").unwrap();
        assert_eq!(key, "user_data");
        assert_eq!(value, json!("a=b"));
    }

    #[test]
    fn test_parse_var_rejects_malformed() {
        assert!(parse_var("region").is_err());
        assert!(parse_var("=x").is_err());
    }
}
