use crate::{config::Config, fetch::Fetcher, metrics};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Upstream playlist fetcher over a shared, pooled HTTP client
    pub fetcher: Fetcher,
    /// Renders the `/metrics` exposition
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// Create a new AppState with the given configuration
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()?;

        let fetcher = Fetcher::new(http_client, config.allow_private_origins);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            metrics: metrics::init(),
        })
    }
}
