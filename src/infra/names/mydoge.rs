//! MyDoge profile lookup.
//!
//! Resolves a Dogecoin address to the display name on its MyDoge profile and
//! keeps the result in the shared cache under [`profile_cache_key`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::domain::{AuxiliaryError, Cache, NameResolver};

/// Default MyDoge API base URL
pub const DEFAULT_MYDOGE_API_URL: &str = "https://api.mydoge.com";

/// Display names are cached for ten hours
pub const NAME_CACHE_TIME_SECONDS: u64 = 60 * 60 * 10;

/// Cache key of the display name for `address`
#[must_use]
pub fn profile_cache_key(address: &str) -> String {
    format!("mydoge:profile:{}", address)
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MydogeConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for MydogeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MYDOGE_API_URL.to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// [`NameResolver`] backed by the MyDoge profile API
pub struct MydogeNameResolver {
    http_client: Client,
    base_url: String,
    cache: Arc<dyn Cache>,
}

impl MydogeNameResolver {
    pub fn new(config: MydogeConfig, cache: Arc<dyn Cache>) -> Result<Self, AuxiliaryError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuxiliaryError::NameResolution(e.to_string()))?;
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    /// Display name registered for `address`. An address without a profile resolves to `None`.
    #[instrument(skip(self))]
    pub async fn get_name(&self, address: &str) -> Result<Option<String>, AuxiliaryError> {
        let url = format!("{}/wallet/{}/profile", self.base_url, address);
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AuxiliaryError::NameResolution(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AuxiliaryError::NameResolution(format!(
                "MyDoge responded {}",
                response.status()
            )));
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|e| AuxiliaryError::NameResolution(e.to_string()))?;
        Ok(profile.name.filter(|name| !name.is_empty()))
    }
}

#[async_trait]
impl NameResolver for MydogeNameResolver {
    async fn refresh_cached_name(&self, address: &str) -> Result<(), AuxiliaryError> {
        if address.is_empty() {
            return Ok(());
        }
        // Misses are cached as an empty string so they are not looked up again until expiry
        let name = self.get_name(address).await?.unwrap_or_default();
        debug!(address = %address, name = %name, "Caching donor name");
        self.cache
            .set(&profile_cache_key(address), name, NAME_CACHE_TIME_SECONDS)
            .await
    }
}
