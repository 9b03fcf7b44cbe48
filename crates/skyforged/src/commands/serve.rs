use crate::context::AppContext;
use colored::Colorize;
use skyforge_inventory::Scheduler;

/// Run the worker pool and the reconciliation scheduler until Ctrl-C
pub async fn handle(ctx: AppContext) -> anyhow::Result<()> {
    let (queue, pool) = ctx.pipeline(ctx.config.workers);
    let scheduler = Scheduler::new(ctx.reconciler(), ctx.config.sync_interval());

    println!(
        "{} {} workers, inventory sync every {}s",
        "skyforged running:".green().bold(),
        pool.len(),
        ctx.config.sync_interval().as_secs()
    );
    println!("{}", "Press Ctrl-C to stop".dimmed());

    let cycles = scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    tracing::info!("Shutting down after {} sync cycles", cycles);
    drop(queue);
    pool.join().await;

    println!("{}", "skyforged stopped".yellow());
    Ok(())
}
