//! Collaborator seams the gateway core depends on.
//!
//! The serving layer supplies implementations backed by its database and
//! secret storage; tests supply in-memory ones. [`LocalRateLimiter`] is the
//! reference single-process limiter.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::types::{BackendServer, ModelDetails, ModelMetadata};

/// Source of backend servers.
#[async_trait]
pub trait ServerRegistry: Send + Sync {
    /// All currently active servers.
    async fn active_servers(&self) -> Result<Vec<BackendServer>, GatewayError>;

    /// Active servers known to expose `model`. An empty result means no
    /// server claims the model; callers then fall back to all active servers.
    async fn servers_with_model(&self, model: &str) -> Result<Vec<BackendServer>, GatewayError>;
}

/// Source of routable model metadata.
#[async_trait]
pub trait ModelCatalog: Send + Sync {
    async fn models(&self) -> Result<Vec<ModelMetadata>, GatewayError>;

    /// Pricing and context enrichment keyed by model name. Missing entries
    /// degrade scoring and tier checks gracefully.
    async fn model_details(&self) -> Result<HashMap<String, ModelDetails>, GatewayError>;
}

/// Resolves opaque credential references into secrets.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn resolve(&self, reference: &str) -> Result<SecretString, GatewayError>;
}

/// One completed (or failed) dispatch, for accounting.
#[derive(Debug, Clone)]
pub struct UsageEvent {
    pub request_id: Uuid,
    pub api_key_id: i64,
    pub endpoint: String,
    pub status_code: u16,
    pub server_id: Option<i64>,
    pub model: Option<String>,
}

/// Usage accounting sink. Recording must never fail a request, so the trait
/// is infallible; implementations log their own persistence errors.
#[async_trait]
pub trait UsageLog: Send + Sync {
    async fn record(&self, event: UsageEvent);
}

/// No-op sink for tests and minimal deployments.
pub struct NullUsageLog;

#[async_trait]
impl UsageLog for NullUsageLog {
    async fn record(&self, _event: UsageEvent) {}
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Fixed-window request limiter keyed by caller identity.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check_and_count(&self, key: &str) -> Result<RateDecision, GatewayError>;
}

/// In-process fixed-window limiter. The first request of a window sets the
/// window expiry; a shared deployment would implement [`RateLimiter`] over a
/// shared store with the same first-writer-sets-expiry rule.
pub struct LocalRateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<String, (Instant, u32)>>,
}

impl LocalRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for LocalRateLimiter {
    async fn check_and_count(&self, key: &str) -> Result<RateDecision, GatewayError> {
        let now = Instant::now();
        let mut windows = self.windows.lock().await;
        let entry = windows.entry(key.to_string()).or_insert((now + self.window, 0));
        if now >= entry.0 {
            *entry = (now + self.window, 0);
        }
        if entry.1 >= self.limit {
            return Ok(RateDecision::Limited {
                retry_after: entry.0.saturating_duration_since(now),
            });
        }
        entry.1 += 1;
        Ok(RateDecision::Allowed {
            remaining: self.limit - entry.1,
        })
    }
}
