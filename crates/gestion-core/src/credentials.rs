//! OAuth token sources for Google APIs.
//!
//! Two providers exist, one per [`CredentialMode`]:
//!
//! - [`ServiceAccountKeyProvider`] signs an RS256 JWT grant with a service
//!   account key file and exchanges it at the key's `token_uri`.
//! - [`MetadataServerProvider`] asks the platform metadata server, which is
//!   how code running on Cloud Run / Cloud Functions gets credentials.
//!
//! Both cache the token until shortly before it expires. The mode is picked
//! by configuration; nothing here looks at the filesystem to decide.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::defaults::{CLOUD_PLATFORM_SCOPE, METADATA_TOKEN_URL};
use crate::error::{Error, Result};
use crate::traits::{CredentialMode, CredentialProvider};

/// Tokens are refreshed this long before their reported expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime requested for JWT grants.
const GRANT_LIFETIME_SECS: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Cache shared by both providers.
#[derive(Default)]
struct TokenCache {
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    async fn fresh(&self) -> Option<String> {
        let guard = self.slot.read().await;
        guard
            .as_ref()
            .filter(|cached| Instant::now() < cached.refresh_at)
            .map(|cached| cached.token.clone())
    }

    async fn store(&self, response: TokenResponse) -> String {
        let lifetime = Duration::from_secs(response.expires_in).saturating_sub(REFRESH_MARGIN);
        let token = response.access_token;
        *self.slot.write().await = Some(CachedToken {
            token: token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        token
    }
}

/// Fields read from a service account key file.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Token provider backed by an explicit service account key.
pub struct ServiceAccountKeyProvider {
    key: ServiceAccountKey,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cache: TokenCache,
}

impl ServiceAccountKeyProvider {
    /// Load the key file at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read service account key {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a key from its JSON text.
    pub fn from_json(raw: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(raw)
            .map_err(|e| Error::Config(format!("Invalid service account key: {}", e)))?;
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid service account private key: {}", e)))?;

        Ok(Self {
            key,
            encoding_key,
            client: reqwest::Client::new(),
            cache: TokenCache::default(),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Project id recorded in the key, if any.
    pub fn project_id(&self) -> Option<&str> {
        self.key.project_id.as_deref()
    }

    fn signed_grant(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Claims<'a> {
            iss: &'a str,
            scope: &'a str,
            aud: &'a str,
            iat: i64,
            exp: i64,
        }

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + GRANT_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token grant: {}", e)))
    }
}

#[async_trait]
impl CredentialProvider for ServiceAccountKeyProvider {
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cache.fresh().await {
            return Ok(token);
        }

        let assertion = self.signed_grant()?;
        debug!(client_email = %self.key.client_email, "Exchanging service account grant");

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Token exchange failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Token endpoint rejected service account grant");
            return Err(Error::Internal(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse token response: {}", e)))?;
        Ok(self.cache.store(parsed).await)
    }

    fn mode(&self) -> CredentialMode {
        CredentialMode::KeyFile
    }
}

/// Token provider backed by the platform metadata server.
pub struct MetadataServerProvider {
    token_url: String,
    client: reqwest::Client,
    cache: TokenCache,
}

impl MetadataServerProvider {
    pub fn new() -> Self {
        Self::with_url(METADATA_TOKEN_URL.to_string())
    }

    /// Use a non-default token endpoint.
    pub fn with_url(token_url: String) -> Self {
        Self {
            token_url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_default(),
            cache: TokenCache::default(),
        }
    }
}

impl Default for MetadataServerProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProvider for MetadataServerProvider {
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cache.fresh().await {
            return Ok(token);
        }

        let response = self
            .client
            .get(&self.token_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| Error::Internal(format!("Metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Internal(format!(
                "Metadata server returned {}",
                status
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Internal(format!("Failed to parse metadata token: {}", e)))?;
        Ok(self.cache.store(parsed).await)
    }

    fn mode(&self) -> CredentialMode {
        CredentialMode::Ambient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parse_rejects_garbage() {
        let err = ServiceAccountKeyProvider::from_json("{}").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_key_parse_rejects_bad_pem() {
        let raw = serde_json::json!({
            "client_email": "svc@example.iam.gserviceaccount.com",
            "private_key": "not a pem"
        })
        .to_string();
        let err = ServiceAccountKeyProvider::from_json(&raw).err().unwrap();
        assert!(err.to_string().contains("private key"));
    }

    #[test]
    fn test_missing_key_file_is_config_error() {
        let err = ServiceAccountKeyProvider::from_file(Path::new("/nonexistent/key.json"))
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_token_response_default_expiry() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.expires_in, 3600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_expires_before_token() {
        let cache = TokenCache::default();
        assert!(cache.fresh().await.is_none());

        cache
            .store(TokenResponse {
                access_token: "t1".into(),
                expires_in: 120,
            })
            .await;
        assert_eq!(cache.fresh().await.as_deref(), Some("t1"));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.fresh().await.as_deref(), Some("t1"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.fresh().await.is_none());
    }

    #[test]
    fn test_modes() {
        assert_eq!(MetadataServerProvider::new().mode(), CredentialMode::Ambient);
        assert!(CredentialMode::Ambient.is_production());
        assert!(!CredentialMode::KeyFile.is_production());
        assert_eq!(CredentialMode::KeyFile.to_string(), "key-file");
    }
}
