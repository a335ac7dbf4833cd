//! Gateway settings and HTTP client construction.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::retry::RetryConfig;

/// Tunable gateway behavior. Every field has a serving default, so partial
/// configuration files deserialize cleanly via `#[serde(default)]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewaySettings {
    /// Retries after the first dispatch attempt
    pub max_retries: u32,
    /// Total retry budget in seconds, attempts and backoff included
    pub retry_total_timeout_secs: f64,
    /// Initial backoff delay in milliseconds
    pub retry_base_delay_ms: u64,
    /// Requests allowed per key per window
    pub rate_limit_requests: u32,
    pub rate_limit_window_minutes: u64,
    /// End-to-end request timeout; generous because streams stay open
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout_secs: u64,
    /// Attribution headers sent to aggregator servers
    pub aggregator_referer: Option<String>,
    pub aggregator_title: Option<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_total_timeout_secs: 2.0,
            retry_base_delay_ms: 50,
            rate_limit_requests: 100,
            rate_limit_window_minutes: 1,
            request_timeout_secs: 600,
            connect_timeout_secs: 10,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            aggregator_referer: None,
            aggregator_title: None,
        }
    }
}

impl GatewaySettings {
    /// Retry configuration derived from the dispatch-related fields.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(self.max_retries)
            .with_total_deadline(Duration::from_secs_f64(self.retry_total_timeout_secs))
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_minutes * 60)
    }
}

/// Build the shared pooled HTTP client used for every upstream dispatch.
pub fn build_http_client(settings: &GatewaySettings) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .pool_max_idle_per_host(settings.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(settings.pool_idle_timeout_secs))
        .build()
        .map_err(|e| GatewayError::Configuration(format!("failed to build HTTP client: {e}")))
}
