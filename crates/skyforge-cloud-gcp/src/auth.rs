//! Service account authentication (OAuth 2.0 JWT bearer grant)

use crate::error::{GcpError, Result};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use skyforge_cloud::GcpCredentials;
use tokio::sync::OnceCell;

const READ_ONLY_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform.read-only";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Assertion lifetime; Google rejects anything above one hour
const ASSERTION_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize, PartialEq)]
pub(crate) struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

impl Claims {
    pub(crate) fn new(credentials: &GcpCredentials, now: i64) -> Self {
        Self {
            iss: credentials.client_email.clone(),
            scope: READ_ONLY_SCOPE.to_string(),
            aud: credentials.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Mints and caches one access token per adapter
pub struct ServiceAccountAuth {
    client: reqwest::Client,
    credentials: GcpCredentials,
    token: OnceCell<String>,
}

impl ServiceAccountAuth {
    pub fn new(client: reqwest::Client, credentials: GcpCredentials) -> Self {
        Self {
            client,
            credentials,
            token: OnceCell::new(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.credentials.project_id
    }

    /// Signed RS256 assertion for the token endpoint
    pub fn assertion(&self, now: i64) -> Result<String> {
        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|_| GcpError::InvalidKey("private_key is not a valid RSA PEM".to_string()))?;
        let claims = Claims::new(&self.credentials, now);
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| GcpError::InvalidKey(format!("cannot sign assertion: {}", e)))
    }

    pub async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| async {
                let assertion = self.assertion(chrono::Utc::now().timestamp())?;
                let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];

                tracing::debug!(
                    "Requesting GCP token for project {}",
                    self.credentials.project_id
                );
                let response = self
                    .client
                    .post(&self.credentials.token_uri)
                    .form(&form)
                    .send()
                    .await?;
                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GcpError::AuthenticationFailed(format!(
                        "{}: {}",
                        status,
                        body.trim()
                    )));
                }

                let token: TokenResponse = response.json().await?;
                Ok::<_, GcpError>(token.access_token)
            })
            .await?;
        Ok(token.as_str())
    }
}
