use crate::context::AppContext;
use colored::Colorize;

pub async fn handle(ctx: &AppContext, user_id: Option<i64>) -> anyhow::Result<()> {
    let reconciler = ctx.reconciler();
    let summary = match user_id {
        Some(user_id) => reconciler.sync_user(user_id).await?,
        None => reconciler.sync_all().await?,
    };

    let failed = if summary.failed > 0 {
        summary.failed.to_string().red()
    } else {
        summary.failed.to_string().green()
    };
    println!(
        "{} {} users, {} credentials, {} synced, {} failed",
        "Inventory sync:".bold(),
        summary.users,
        summary.credentials,
        summary.succeeded.to_string().green(),
        failed
    );
    Ok(())
}
