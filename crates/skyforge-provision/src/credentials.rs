//! Credential selection and decryption for a job

use crate::error::{ProvisionError, Result};
use skyforge_cloud::{CredentialEnv, ProviderCredentials};
use skyforge_core::{CloudCredential, Provider, StateStore};
use skyforge_vault::CredentialVault;

/// Credential a job should use for (user, provider)
///
/// Most recently created wins; equal timestamps go to the highest id.
pub fn select_credential(
    candidates: &[CloudCredential],
    user_id: i64,
    provider: Provider,
) -> Option<&CloudCredential> {
    candidates
        .iter()
        .filter(|c| c.user_id == user_id && c.provider == provider)
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
}

/// Decrypt one stored credential into its typed payload
pub fn open_credential(
    vault: &CredentialVault,
    credential: &CloudCredential,
) -> Result<ProviderCredentials> {
    let plaintext = vault
        .decrypt(&credential.encrypted_data)
        .map_err(|e| ProvisionError::Decryption {
            credential_id: credential.id,
            reason: e.to_string(),
        })?;

    ProviderCredentials::from_json(credential.provider, &plaintext).map_err(|e| {
        ProvisionError::InvalidCredential {
            credential_id: credential.id,
            reason: e.to_string(),
        }
    })
}

/// Select, decrypt and map the credential into the tool's environment
pub async fn resolve_env(
    store: &StateStore,
    vault: &CredentialVault,
    user_id: i64,
    provider: Provider,
) -> Result<(i64, CredentialEnv)> {
    let candidates = store.credentials_for_provider(user_id, provider).await?;
    let credential = select_credential(&candidates, user_id, provider)
        .ok_or(ProvisionError::MissingCredential { user_id, provider })?;

    let env = open_credential(vault, credential)?.tool_env();
    tracing::debug!(
        user_id,
        provider = %provider,
        credential_id = credential.id,
        "Resolved credential environment"
    );
    Ok((credential.id, env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn credential(id: i64, user_id: i64, provider: Provider, age_secs: i64) -> CloudCredential {
        CloudCredential {
            id,
            user_id,
            provider,
            name: format!("cred-{id}"),
            encrypted_data: String::new(),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_most_recent_wins() {
        let creds = vec![
            credential(1, 7, Provider::Aws, 100),
            credential(2, 7, Provider::Aws, 10),
            credential(3, 7, Provider::Aws, 50),
        ];
        assert_eq!(select_credential(&creds, 7, Provider::Aws).map(|c| c.id), Some(2));
    }

    #[test]
    fn test_tie_breaks_on_highest_id() {
        let mut a = credential(4, 7, Provider::Gcp, 0);
        let mut b = credential(9, 7, Provider::Gcp, 0);
        let now = Utc::now();
        a.created_at = now;
        b.created_at = now;

        let creds = vec![b, a];
        assert_eq!(select_credential(&creds, 7, Provider::Gcp).map(|c| c.id), Some(9));
    }

    #[test]
    fn test_filters_user_and_provider() {
        let creds = vec![
            credential(1, 8, Provider::Aws, 0),
            credential(2, 7, Provider::Azure, 0),
        ];
        assert!(select_credential(&creds, 7, Provider::Aws).is_none());
    }

    #[tokio::test]
    async fn test_resolve_env_decrypts_latest() {
        let store = StateStore::in_memory();
        let vault = CredentialVault::from_secret("operator-secret");
        let old = vault
            .encrypt(br#"{"access_key": "OLD", "secret_key": "x"}"#)
            .unwrap();
        let new = vault
            .encrypt(br#"{"access_key": "NEW", "secret_key": "y", "region": "eu-west-1"}"#)
            .unwrap();
        store.add_credential(7, Provider::Aws, "old", old).await.unwrap();
        let latest = store.add_credential(7, Provider::Aws, "new", new).await.unwrap();

        let (id, env) = resolve_env(&store, &vault, 7, Provider::Aws).await.unwrap();
        assert_eq!(id, latest.id);
        assert_eq!(env.get("AWS_ACCESS_KEY_ID"), Some("NEW"));
        assert_eq!(env.get("AWS_DEFAULT_REGION"), Some("eu-west-1"));
    }

    #[tokio::test]
    async fn test_resolve_env_wrong_key() {
        let store = StateStore::in_memory();
        let other = CredentialVault::from_secret("someone-else");
        let cipher = other.encrypt(br#"{"access_key": "a", "secret_key": "b"}"#).unwrap();
        store.add_credential(7, Provider::Aws, "c", cipher).await.unwrap();

        let vault = CredentialVault::from_secret("operator-secret");
        let err = resolve_env(&store, &vault, 7, Provider::Aws).await.unwrap_err();
        assert_eq!(err.kind(), "decryption");
    }

    #[tokio::test]
    async fn test_resolve_env_missing() {
        let store = StateStore::in_memory();
        let vault = CredentialVault::from_secret("operator-secret");
        let err = resolve_env(&store, &vault, 7, Provider::Azure).await.unwrap_err();
        assert!(matches!(err, ProvisionError::MissingCredential { user_id: 7, .. }));
    }
}
