//! BlockCypher explorer client.
//!
//! Talks to the BlockCypher Dogecoin API. Every request carries the API token
//! as the `token` query parameter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{
    AddressFullPage, AddressSummary, AppError, CreateHookRequest, ExplorerClient, ExplorerHook,
    ExternalServiceError, Transaction, to_whole_units,
};

/// Default BlockCypher base URL for Dogecoin mainnet
pub const DEFAULT_BLOCKCYPHER_API_URL: &str = "https://api.blockcypher.com/v1/doge/main";

/// Transactions per page requested from `/addrs/{address}/full`
pub const FULL_PAGE_LIMIT: u32 = 50;

/// Inputs/outputs per transaction requested from `/addrs/{address}/full`
pub const FULL_PAGE_TX_LIMIT: u32 = 1000;

/// Confirmations required before the explorer fires a `confirmed-tx` hook
pub const HOOK_CONFIRMATIONS: u32 = 6;

/// BlockCypher client configuration
#[derive(Debug, Clone)]
pub struct BlockcypherConfig {
    pub base_url: String,
    pub token: Option<SecretString>,
    /// Pause before each follow-up page, to stay under the rate limit
    pub page_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for BlockcypherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BLOCKCYPHER_API_URL.to_string(),
            token: None,
            page_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// [`ExplorerClient`] backed by the BlockCypher REST API
#[derive(Debug, Clone)]
pub struct BlockcypherClient {
    http_client: Client,
    config: BlockcypherConfig,
}

impl BlockcypherClient {
    pub fn new(config: BlockcypherConfig) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                AppError::ExternalService(ExternalServiceError::Configuration(e.to_string()))
            })?;
        Ok(Self {
            http_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => builder.query(&[("token", token.expose_secret())]),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, AppError> {
        let response = self.authorized(builder).send().await.map_err(|e| {
            error!(error = %e, "BlockCypher request failed");
            if e.is_timeout() {
                AppError::ExternalService(ExternalServiceError::Timeout(e.to_string()))
            } else {
                AppError::ExternalService(ExternalServiceError::Unavailable(e.to_string()))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "BlockCypher returned error");
            let message = format!("BlockCypher responded {}: {}", status, body);
            return Err(AppError::ExternalService(
                if status == StatusCode::TOO_MANY_REQUESTS {
                    ExternalServiceError::RateLimited(message)
                } else {
                    ExternalServiceError::Unavailable(message)
                },
            ));
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, AppError> {
        self.send(builder).await?.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse BlockCypher response");
            AppError::ExternalService(ExternalServiceError::ParseError(e.to_string()))
        })
    }

    /// One page of the address' full transaction list. `before` and `after` bound block heights.
    #[instrument(skip(self))]
    pub async fn get_address_full(
        &self,
        address: &str,
        before: Option<i64>,
        after: Option<i64>,
    ) -> Result<AddressFullPage, AppError> {
        let mut params: Vec<(&str, String)> = vec![
            ("limit", FULL_PAGE_LIMIT.to_string()),
            ("txlimit", FULL_PAGE_TX_LIMIT.to_string()),
        ];
        if let Some(before) = before {
            params.push(("before", before.to_string()));
        }
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }

        let request = self
            .http_client
            .get(self.url(&format!("/addrs/{}/full", address)))
            .query(&params);
        self.send_json(request).await
    }
}

#[async_trait]
impl ExplorerClient for BlockcypherClient {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        // The chain root is cheap and unauthenticated-friendly
        let request = self.http_client.get(self.url(""));
        self.send(request).await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn fetch_transactions(
        &self,
        address: &str,
        cursor_block_height: Option<i64>,
    ) -> Result<Vec<Transaction>, AppError> {
        let first = self
            .get_address_full(address, None, cursor_block_height)
            .await?;
        let mut txs = first.txs;
        let mut has_more = first.has_more;

        while has_more {
            let Some(before) = txs.last().and_then(|tx| tx.block_height) else {
                warn!(
                    address = %address,
                    fetched = txs.len(),
                    "Explorer reported more pages without a confirmed boundary, stopping"
                );
                break;
            };

            info!(address = %address, fetched = txs.len(), before = before, "Paging BlockCypher");
            tokio::time::sleep(self.config.page_delay).await;

            let page = self
                .get_address_full(address, Some(before), cursor_block_height)
                .await?;
            if page.txs.is_empty() {
                break;
            }
            txs.extend(page.txs);
            has_more = page.has_more;
            debug!(has_more = has_more, "BlockCypher page received");
        }

        Ok(txs)
    }

    #[instrument(skip(self))]
    async fn get_address(&self, address: &str) -> Result<AddressSummary, AppError> {
        let request = self
            .http_client
            .get(self.url(&format!("/addrs/{}", address)));
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    async fn get_balance(&self, address: &str) -> Result<Decimal, AppError> {
        let request = self
            .http_client
            .get(self.url(&format!("/addrs/{}/balance", address)));
        let summary: AddressSummary = self.send_json(request).await?;
        Ok(to_whole_units(summary.final_balance))
    }

    #[instrument(skip(self, request), fields(url = %request.url))]
    async fn create_hook(
        &self,
        address: &str,
        request: &CreateHookRequest,
    ) -> Result<ExplorerHook, AppError> {
        let hook = ExplorerHook {
            id: None,
            event: "confirmed-tx".to_string(),
            address: Some(address.to_string()),
            url: request.url.clone(),
            confirmations: Some(HOOK_CONFIRMATIONS),
            sign_key: Some("preset".to_string()),
        };
        let builder = self.http_client.post(self.url("/hooks")).json(&hook);
        let created: ExplorerHook = self.send_json(builder).await?;
        info!(id = ?created.id, "Explorer webhook created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn list_hooks(&self) -> Result<Vec<ExplorerHook>, AppError> {
        let request = self.http_client.get(self.url("/hooks"));
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    async fn get_hook(&self, id: &str) -> Result<ExplorerHook, AppError> {
        let request = self.http_client.get(self.url(&format!("/hooks/{}", id)));
        self.send_json(request).await
    }

    #[instrument(skip(self))]
    async fn delete_hook(&self, id: &str) -> Result<(), AppError> {
        let request = self
            .http_client
            .delete(self.url(&format!("/hooks/{}", id)));
        self.send(request).await?;
        info!(id = %id, "Explorer webhook deleted");
        Ok(())
    }
}
