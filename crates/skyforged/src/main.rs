mod adapters;
mod commands;
mod context;

use clap::{Parser, Subcommand};
use commands::provision::{ProvisionRequest, parse_var};
use context::{AppContext, Overrides};
use serde_json::Value;
use skyforge_core::Provider;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skyforged")]
#[command(about = "Multi-cloud provisioning and inventory daemon", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (skips discovery)
    #[arg(short, long, global = true, env = "SKYFORGE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON state file
    #[arg(long, global = true, env = "SKYFORGE_STATE")]
    state: Option<PathBuf>,

    /// IaC module repository root
    #[arg(long, global = true, env = "SKYFORGE_MODULE_ROOT")]
    module_root: Option<PathBuf>,

    /// Operator secret the credential key is derived from
    #[arg(long, global = true, env = "SKYFORGE_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the provisioning workers and the inventory scheduler
    Serve {
        /// Number of provisioning workers
        #[arg(short, long, env = "SKYFORGE_WORKERS")]
        workers: Option<usize>,
    },
    /// Manage stored cloud credentials
    #[command(subcommand)]
    Credential(CredentialCommands),
    /// Provision one resource and wait for the result
    Provision {
        #[arg(short, long)]
        user: i64,
        /// aws, azure or gcp
        #[arg(short, long)]
        provider: Provider,
        /// Resource type (vm, storage, ...)
        #[arg(short = 't', long = "type")]
        resource_type: String,
        #[arg(short, long)]
        name: String,
        /// Project the resource is recorded under
        #[arg(long, default_value = "default")]
        project: String,
        /// Module variable as key=value (repeatable)
        #[arg(long = "var", value_parser = parse_var)]
        vars: Vec<(String, Value)>,
    },
    /// Run destroy for a provisioned resource
    Destroy {
        #[arg(short, long)]
        resource: i64,
    },
    /// Run one inventory reconciliation cycle
    SyncOnce {
        /// Only this user's credentials
        #[arg(short, long)]
        user: Option<i64>,
    },
    /// Show synced inventory and provider health
    Inventory {
        #[arg(short, long)]
        user: i64,
    },
}

#[derive(Subcommand)]
enum CredentialCommands {
    /// Encrypt and store a credential payload
    Add {
        #[arg(short, long)]
        user: i64,
        #[arg(short, long)]
        provider: Provider,
        #[arg(short, long)]
        name: String,
        /// JSON payload file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// List a user's credentials (metadata only)
    List {
        #[arg(short, long)]
        user: i64,
    },
    /// Delete a credential
    Remove { id: i64 },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let filter = if verbose {
        filter.add_directive(tracing::Level::DEBUG.into())
    } else {
        filter
    };

    // stdout carries command output, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let workers = match &cli.command {
        Commands::Serve { workers } => *workers,
        _ => None,
    };
    let overrides = Overrides {
        config: cli.config,
        state: cli.state,
        module_root: cli.module_root,
        workers,
    };
    let ctx = AppContext::load(overrides, cli.secret_key.as_deref()).await?;

    match cli.command {
        Commands::Serve { .. } => commands::serve::handle(ctx).await?,
        Commands::Credential(cmd) => match cmd {
            CredentialCommands::Add {
                user,
                provider,
                name,
                file,
            } => commands::credential::add(&ctx, user, provider, &name, &file).await?,
            CredentialCommands::List { user } => commands::credential::list(&ctx, user).await?,
            CredentialCommands::Remove { id } => commands::credential::remove(&ctx, id).await?,
        },
        Commands::Provision {
            user,
            provider,
            resource_type,
            name,
            project,
            vars,
        } => {
            commands::provision::handle(
                &ctx,
                ProvisionRequest {
                    user_id: user,
                    provider,
                    resource_type,
                    name,
                    project,
                    variables: vars,
                },
            )
            .await?
        }
        Commands::Destroy { resource } => commands::provision::destroy(&ctx, resource).await?,
        Commands::SyncOnce { user } => commands::sync::handle(&ctx, user).await?,
        Commands::Inventory { user } => commands::inventory::handle(&ctx, user).await?,
    }

    Ok(())
}
