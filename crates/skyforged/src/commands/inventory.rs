use crate::context::AppContext;
use colored::Colorize;
use skyforge_core::HealthStatus;

pub async fn handle(ctx: &AppContext, user_id: i64) -> anyhow::Result<()> {
    let health = ctx.store.health_for(user_id).await?;
    println!("{}", "Provider health".bold());
    if health.is_empty() {
        println!("  {}", "No health checks recorded".dimmed());
    }
    for h in &health {
        let status = match h.status {
            HealthStatus::Healthy => h.status.to_string().green(),
            HealthStatus::Degraded => h.status.to_string().yellow(),
            HealthStatus::Error => h.status.to_string().red(),
            HealthStatus::Unknown => h.status.to_string().dimmed(),
        };
        println!(
            "  {:<6} credential {:<4} {:<10} {:>6}ms  {}",
            h.provider.as_str(),
            h.credential_id,
            status,
            h.response_time_ms,
            h.error_message.as_deref().unwrap_or_default().dimmed()
        );
    }

    let inventory = ctx.store.inventory_for(user_id).await?;
    println!();
    println!("{}", "Inventory".bold());
    if inventory.is_empty() {
        println!("  {}", "No resources synced".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "  {:<6} {:<16} {:<28} {:<24} {:<14} {:<12}",
            "CLOUD", "TYPE", "ID", "NAME", "REGION", "STATUS"
        )
        .bold()
    );
    println!("  {}", "─".repeat(104).dimmed());
    for r in inventory {
        println!(
            "  {:<6} {:<16} {:<28} {:<24} {:<14} {:<12}",
            r.provider.as_str(),
            r.resource_type,
            r.resource_id,
            r.resource_name,
            r.region,
            r.status
        );
    }
    Ok(())
}
