use std::sync::Arc;
use std::time::Duration;

use stats::{
    CachePolicy, CachedFetch, ChartKey, ChartRegistry, CkpoolClient, HashrateSource, PoolHashrate,
    PoolStatusRecord, Sample, StatsError, UserHashrate, UserRecord,
};
use tracing::debug;
use web_utils::unix_timestamp;

use crate::config::Config;

pub mod config;
pub mod web;

/// Everything the web handlers share: the upstream client, one cache per
/// call site and the mounted chart views.
pub struct AppState {
    client: CkpoolClient,
    dashboard_status: CachedFetch<(), PoolStatusRecord>,
    api_status: CachedFetch<(), PoolStatusRecord>,
    user_pages: CachedFetch<String, UserRecord>,
    user_api: CachedFetch<String, UserRecord>,
    charts: ChartRegistry,
    stratum_url: String,
    client_poll_interval_secs: u64,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, StatsError> {
        let client = CkpoolClient::new(
            config.upstream_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.pool_idle_timeout_secs),
        )?;
        let pool_policy = CachePolicy::from_ttl_secs(config.pool_status_ttl_secs);
        let user_policy = CachePolicy::from_ttl_secs(config.user_ttl_secs);

        Ok(Self {
            client,
            dashboard_status: CachedFetch::new(pool_policy),
            api_status: CachedFetch::new(pool_policy),
            user_pages: CachedFetch::new(user_policy),
            user_api: CachedFetch::new(user_policy),
            charts: ChartRegistry::new(
                config.chart_capacity,
                Duration::from_secs(config.chart_refresh_interval_secs),
                Duration::from_secs(config.view_idle_timeout_secs),
            ),
            stratum_url: config.stratum_url.clone(),
            client_poll_interval_secs: config.client_poll_interval_secs,
        })
    }

    pub fn charts(&self) -> &ChartRegistry {
        &self.charts
    }

    pub fn stratum_url(&self) -> &str {
        &self.stratum_url
    }

    pub fn client_poll_interval_secs(&self) -> u64 {
        self.client_poll_interval_secs
    }

    /// Pool status for the dashboard page.
    pub async fn dashboard_status(&self) -> Result<PoolStatusRecord, StatsError> {
        self.dashboard_status
            .get_or_fetch((), || self.client.fetch_pool_status())
            .await
    }

    /// Pool status for `/api/hashrate`.
    pub async fn api_status(&self) -> Result<PoolStatusRecord, StatsError> {
        self.api_status
            .get_or_fetch((), || self.client.fetch_pool_status())
            .await
    }

    pub async fn user_page_record(&self, address: &str) -> Result<UserRecord, StatsError> {
        self.user_pages
            .get_or_fetch(address.to_string(), || self.client.fetch_user(address))
            .await
    }

    pub async fn user_api_record(&self, address: &str) -> Result<UserRecord, StatsError> {
        self.user_api
            .get_or_fetch(address.to_string(), || self.client.fetch_user(address))
            .await
    }

    /// Mount (or touch) the pool chart seeded with `seed_hashrate`.
    pub fn pool_chart(&self, seed_hashrate: &str) -> Vec<Sample> {
        self.charts.mount_or_touch(ChartKey::Pool, seed_hashrate, || {
            Arc::new(PoolHashrate::new(self.client.clone())) as Arc<dyn HashrateSource>
        })
    }

    /// Mount (or touch) the chart for `address` seeded with `seed_hashrate`.
    pub fn user_chart(&self, address: &str, seed_hashrate: &str) -> Vec<Sample> {
        self.charts
            .mount_or_touch(ChartKey::User(address.to_string()), seed_hashrate, || {
                Arc::new(UserHashrate::new(self.client.clone(), address)) as Arc<dyn HashrateSource>
            })
    }

    /// Fetch pool status once and mount the pool chart from it.
    pub async fn mount_pool_chart(&self) -> Result<usize, StatsError> {
        let record = self.dashboard_status().await?;
        Ok(self.pool_chart(&record.hashrate1d()).len())
    }

    /// The pool chart missed two refreshes, or was never mounted.
    pub fn is_stale(&self) -> bool {
        self.charts
            .is_stale(&ChartKey::Pool, unix_timestamp())
            .unwrap_or(true)
    }

    /// Unmount idle user charts and drop expired user records.
    pub async fn sweep(&self) {
        let reaped = self.charts.reap_idle();
        let purged = self.user_pages.purge_expired().await + self.user_api.purge_expired().await;
        if reaped > 0 || purged > 0 {
            debug!(
                "Sweep unmounted {} chart view(s), purged {} cached user record(s)",
                reaped, purged
            );
        }
    }

    pub fn shutdown(&self) {
        self.charts.unmount_all();
    }
}
