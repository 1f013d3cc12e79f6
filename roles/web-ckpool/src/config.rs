use serde::Deserialize;
use std::env;
use std::fs;

use stats::stats_client::DEFAULT_UPSTREAM_URL;

const DEFAULT_CONFIG_PATH: &str = "config/web-ckpool.config.toml";

const MAX_CHART_CAPACITY: usize = 10_000;
// One week
const MAX_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub upstream_url: String,
    pub stratum_url: String,
    pub web_server_address: String,
    pub chart_refresh_interval_secs: u64,
    pub chart_capacity: usize,
    pub client_poll_interval_secs: u64,
    pub view_idle_timeout_secs: u64,
    pub pool_status_ttl_secs: u64,
    pub user_ttl_secs: u64,
    pub request_timeout_secs: u64,
    pub pool_idle_timeout_secs: u64,
    pub log_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WebCkpoolConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    upstream: UpstreamConfig,
    #[serde(default)]
    chart: ChartConfig,
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    http_client: HttpClientConfig,
}

#[derive(Debug, Deserialize)]
struct ServerConfig {
    listen_address: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: Some("127.0.0.1:8080".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamConfig {
    url: Option<String>,
    stratum_url: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: Some(DEFAULT_UPSTREAM_URL.to_string()),
            stratum_url: Some("stratum+tcp://solo.ckpool.org:3333".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChartConfig {
    refresh_interval_secs: Option<u64>,
    capacity: Option<usize>,
    client_poll_interval_secs: Option<u64>,
    view_idle_timeout_secs: Option<u64>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: Some(600),
            capacity: Some(stats::DEFAULT_SERIES_CAPACITY),
            client_poll_interval_secs: Some(60),
            view_idle_timeout_secs: Some(3600),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CacheConfig {
    pool_status_ttl_secs: Option<u64>,
    user_ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            pool_status_ttl_secs: Some(0),
            user_ttl_secs: Some(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HttpClientConfig {
    pool_idle_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout_secs: Some(300),
            request_timeout_secs: Some(60),
        }
    }
}

fn flag_value<'a>(args: &'a [String], names: &[&str]) -> Option<&'a String> {
    args.iter()
        .position(|arg| names.contains(&arg.as_str()))
        .and_then(|i| args.get(i + 1))
}

fn check_range(
    key: &str,
    value: u64,
    min: u64,
    max: u64,
) -> Result<u64, Box<dyn std::error::Error>> {
    if value < min || value > max {
        return Err(format!("{} must be between {} and {}, got {}", key, min, max, value).into());
    }
    Ok(value)
}

impl Config {
    pub fn from_args() -> Result<Self, Box<dyn std::error::Error>> {
        let args: Vec<String> = env::args().collect();
        Self::from_arg_list(&args)
    }

    pub fn from_arg_list(args: &[String]) -> Result<Self, Box<dyn std::error::Error>> {
        let log_file = flag_value(args, &["--log-file", "-f"]).cloned();

        // Load config file (can be overridden via CLI); a missing file means defaults
        let config_path = flag_value(args, &["--config", "-c"])
            .map(|s| s.as_str())
            .unwrap_or(DEFAULT_CONFIG_PATH);

        let config_str = fs::read_to_string(config_path).unwrap_or_default();
        let file_config: WebCkpoolConfig = if config_str.is_empty() {
            WebCkpoolConfig::default()
        } else {
            toml::from_str(&config_str)?
        };

        // Parse command line arguments (with config file as fallback)
        let upstream_url = flag_value(args, &["--upstream-url", "-u"])
            .cloned()
            .or(file_config.upstream.url)
            .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string());

        let web_server_address = flag_value(args, &["--web-address", "-w"])
            .cloned()
            .or(file_config.server.listen_address)
            .ok_or("Missing required config: server.listen_address")?;

        let chart_refresh_interval_secs = check_range(
            "chart.refresh_interval_secs",
            file_config.chart.refresh_interval_secs.unwrap_or(600),
            1,
            MAX_INTERVAL_SECS,
        )?;
        let client_poll_interval_secs = check_range(
            "chart.client_poll_interval_secs",
            file_config.chart.client_poll_interval_secs.unwrap_or(60),
            1,
            MAX_INTERVAL_SECS,
        )?;
        let chart_capacity = check_range(
            "chart.capacity",
            file_config
                .chart
                .capacity
                .unwrap_or(stats::DEFAULT_SERIES_CAPACITY) as u64,
            0,
            MAX_CHART_CAPACITY as u64,
        )? as usize;
        let view_idle_timeout_secs = check_range(
            "chart.view_idle_timeout_secs",
            file_config.chart.view_idle_timeout_secs.unwrap_or(3600),
            0,
            MAX_INTERVAL_SECS,
        )?;
        let pool_status_ttl_secs = check_range(
            "cache.pool_status_ttl_secs",
            file_config.cache.pool_status_ttl_secs.unwrap_or(0),
            0,
            MAX_INTERVAL_SECS,
        )?;
        let user_ttl_secs = check_range(
            "cache.user_ttl_secs",
            file_config.cache.user_ttl_secs.unwrap_or(60),
            0,
            MAX_INTERVAL_SECS,
        )?;
        let request_timeout_secs = check_range(
            "http_client.request_timeout_secs",
            file_config.http_client.request_timeout_secs.unwrap_or(60),
            1,
            MAX_INTERVAL_SECS,
        )?;
        let pool_idle_timeout_secs = check_range(
            "http_client.pool_idle_timeout_secs",
            file_config.http_client.pool_idle_timeout_secs.unwrap_or(300),
            0,
            MAX_INTERVAL_SECS,
        )?;

        Ok(Config {
            upstream_url,
            stratum_url: file_config
                .upstream
                .stratum_url
                .unwrap_or_else(|| "stratum+tcp://solo.ckpool.org:3333".to_string()),
            web_server_address,
            chart_refresh_interval_secs,
            chart_capacity,
            client_poll_interval_secs,
            view_idle_timeout_secs,
            pool_status_ttl_secs,
            user_ttl_secs,
            request_timeout_secs,
            pool_idle_timeout_secs,
            log_file,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            stratum_url: "stratum+tcp://solo.ckpool.org:3333".to_string(),
            web_server_address: "127.0.0.1:8080".to_string(),
            chart_refresh_interval_secs: 600,
            chart_capacity: stats::DEFAULT_SERIES_CAPACITY,
            client_poll_interval_secs: 60,
            view_idle_timeout_secs: 3600,
            pool_status_ttl_secs: 0,
            user_ttl_secs: 60,
            request_timeout_secs: 60,
            pool_idle_timeout_secs: 300,
            log_file: None,
        }
    }
}
