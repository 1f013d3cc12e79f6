use std::{sync::Arc, time::Duration};
use tokio::time;
use tracing::{info, warn};

use web_ckpool::{config::Config, web::run_http_server, AppState};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_args()?;

    // Setup tracing with optional file output
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt().with_env_filter(env_filter);

    if let Some(log_file) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| format!("Failed to open log file {}: {}", log_file, e))?;
        fmt_layer.with_writer(Arc::new(file)).init();
    } else {
        fmt_layer.init();
    }

    info!("Starting web-ckpool service");
    info!("Upstream URL: {}", config.upstream_url);
    info!("Web server address: {}", config.web_server_address);
    info!(
        "Chart refresh interval: {} seconds, {} samples",
        config.chart_refresh_interval_secs, config.chart_capacity
    );

    let state = Arc::new(AppState::new(&config)?);

    // The pool chart starts with the service; a failure here is retried by the first page render
    match state.mount_pool_chart().await {
        Ok(_) => info!("Pool chart mounted"),
        Err(e) => warn!("Could not seed pool chart at startup: {}", e),
    }

    let sweep_state = state.clone();
    let sweeper = tokio::spawn(async move {
        let mut interval = time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweep_state.sweep().await;
        }
    });

    let result = run_http_server(config.web_server_address.clone(), state.clone(), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await;

    sweeper.abort();
    state.shutdown();
    info!("web-ckpool stopped");

    result
}
