use async_trait::async_trait;
use moka::future::Cache;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::gcp::errors::{CloudError, Result};

/// Refresh access tokens this long before Google says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of OAuth access tokens (Google APIs) and OIDC identity tokens (IAP-protected Airflow)
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;

    async fn identity_token(&self, audience: &str) -> Result<String>;
}

/// Fixed token for local runs and tests
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String> {
        Ok(self.token.clone())
    }

    async fn identity_token(&self, _audience: &str) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Tokens for the default service account, served by the GCE metadata server
#[derive(Debug, Clone)]
pub struct MetadataTokenProvider {
    http: reqwest::Client,
    base_url: String,
    cache: Cache<String, CachedToken>,
}

impl MetadataTokenProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        // Access tokens live one hour; the TTL only bounds stale entries
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(3600))
            .build();

        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache,
        }
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let url = format!("{}/instance/service-accounts/default/{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .header("Metadata-Flavor", "Google")
            .query(query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CloudError::Auth(format!(
                "metadata server returned {} for {}",
                response.status(),
                path
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl TokenProvider for MetadataTokenProvider {
    async fn access_token(&self) -> Result<String> {
        const KEY: &str = "access_token";

        if let Some(cached) = self.cache.get(KEY).await {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.value);
            }
        }

        let token: MetadataTokenResponse = self.fetch("token", &[]).await?.json().await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);
        debug!(expires_in = token.expires_in, "Fetched access token from metadata server");

        self.cache
            .insert(
                KEY.to_string(),
                CachedToken {
                    value: token.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                },
            )
            .await;
        Ok(token.access_token)
    }

    async fn identity_token(&self, audience: &str) -> Result<String> {
        let token = self
            .fetch("identity", &[("audience", audience), ("format", "full")])
            .await?
            .text()
            .await?;
        Ok(token.trim().to_string())
    }
}
