use crate::context::AppContext;
use anyhow::Context as _;
use colored::Colorize;
use skyforge_cloud::ProviderCredentials;
use skyforge_core::Provider;
use std::path::Path;

/// Validate, encrypt and store a credential payload file
pub async fn add(
    ctx: &AppContext,
    user_id: i64,
    provider: Provider,
    name: &str,
    file: &Path,
) -> anyhow::Result<()> {
    let payload = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    // Reject payloads the adapters and the IaC tool could not use
    ProviderCredentials::from_json(provider, &payload)
        .with_context(|| format!("Invalid {} credential payload", provider))?;

    let cipher = ctx
        .vault
        .encrypt(&payload)
        .context("Failed to encrypt credential")?;
    let credential = ctx
        .store
        .add_credential(user_id, provider, name, cipher)
        .await?;

    println!(
        "{} {} credential '{}' stored (id {})",
        "✓".green(),
        provider.to_string().cyan(),
        name,
        credential.id
    );
    Ok(())
}

pub async fn list(ctx: &AppContext, user_id: i64) -> anyhow::Result<()> {
    let credentials = ctx.store.credentials_for(user_id).await?;
    if credentials.is_empty() {
        println!("{}", "No credentials stored".dimmed());
        return Ok(());
    }

    println!(
        "{}",
        format!("{:<6} {:<8} {:<24} {:<25}", "ID", "PROVIDER", "NAME", "CREATED").bold()
    );
    for c in credentials {
        println!(
            "{:<6} {:<8} {:<24} {:<25}",
            c.id,
            c.provider.as_str(),
            c.name,
            c.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub async fn remove(ctx: &AppContext, credential_id: i64) -> anyhow::Result<()> {
    ctx.store.delete_credential(credential_id).await?;
    println!("{} credential {} deleted", "✓".green(), credential_id);
    Ok(())
}
