use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    error::StatsError,
    pool_status::PoolStatusRecord,
    stats_poller::HashrateSource,
    user_stats::{validate_address, UserRecord},
};

pub const DEFAULT_UPSTREAM_URL: &str = "https://solo.ckpool.org";

/// HTTP client for the public ckpool status endpoints
/// Every call is a single GET; failures go straight back to the caller, no retries
#[derive(Debug, Clone)]
pub struct CkpoolClient {
    http: reqwest::Client,
    base_url: String,
}

impl CkpoolClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        pool_idle_timeout: Duration,
    ) -> Result<Self, StatsError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .pool_idle_timeout(pool_idle_timeout)
            .pool_max_idle_per_host(1)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch and merge `/pool/pool.status`
    pub async fn fetch_pool_status(&self) -> Result<PoolStatusRecord, StatsError> {
        let body = self
            .get_text(&format!("{}/pool/pool.status", self.base_url))
            .await?;
        PoolStatusRecord::from_ndjson(&body)
    }

    /// Fetch `/users/{address}`
    pub async fn fetch_user(&self, address: &str) -> Result<UserRecord, StatsError> {
        validate_address(address)?;
        let body = self
            .get_text(&format!("{}/users/{}", self.base_url, address))
            .await?;
        UserRecord::from_json(&body)
    }

    async fn get_text(&self, url: &str) -> Result<String, StatsError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!("{} answered {}", url, status);
            return Err(StatsError::UpstreamStatus(status.as_u16()));
        }
        let body = response.text().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }
}

/// Pool-wide 1-day hashrate, fetched fresh on every call.
pub struct PoolHashrate {
    client: CkpoolClient,
}

impl PoolHashrate {
    pub fn new(client: CkpoolClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HashrateSource for PoolHashrate {
    async fn current_hashrate(&self) -> Result<String, StatsError> {
        Ok(self.client.fetch_pool_status().await?.hashrate1d())
    }
}

/// One address's 1-day hashrate, fetched fresh on every call.
pub struct UserHashrate {
    client: CkpoolClient,
    address: String,
}

impl UserHashrate {
    pub fn new(client: CkpoolClient, address: impl Into<String>) -> Self {
        Self {
            client,
            address: address.into(),
        }
    }
}

#[async_trait]
impl HashrateSource for UserHashrate {
    async fn current_hashrate(&self) -> Result<String, StatsError> {
        Ok(self.client.fetch_user(&self.address).await?.hashrate1d)
    }
}
