//! Shared in-memory fixtures for gateway integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use secrecy::SecretString;

use modelgate::error::GatewayError;
use modelgate::gateway::{
    CredentialStore, ModelCatalog, ServerRegistry, UsageEvent, UsageLog,
};
use modelgate::{
    build_http_client, BackendServer, Dialect, GatewayRouter, GatewaySettings, ModelDetails,
    ModelMetadata,
};

pub fn server(id: i64, base_url: &str, dialect: Dialect) -> BackendServer {
    BackendServer {
        id,
        name: format!("server-{id}"),
        base_url: base_url.to_string(),
        dialect,
        active: true,
        credential_ref: None,
    }
}

pub struct StaticRegistry {
    pub servers: Vec<BackendServer>,
    /// model name -> server ids advertising it
    pub advertised: HashMap<String, Vec<i64>>,
}

impl StaticRegistry {
    pub fn new(servers: Vec<BackendServer>) -> Self {
        Self {
            servers,
            advertised: HashMap::new(),
        }
    }

    pub fn advertise(mut self, model: &str, server_ids: &[i64]) -> Self {
        self.advertised
            .insert(model.to_string(), server_ids.to_vec());
        self
    }
}

#[async_trait]
impl ServerRegistry for StaticRegistry {
    async fn active_servers(&self) -> Result<Vec<BackendServer>, GatewayError> {
        Ok(self.servers.iter().filter(|s| s.active).cloned().collect())
    }

    async fn servers_with_model(&self, model: &str) -> Result<Vec<BackendServer>, GatewayError> {
        let ids = self.advertised.get(model).cloned().unwrap_or_default();
        Ok(self
            .servers
            .iter()
            .filter(|s| s.active && ids.contains(&s.id))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct StaticCatalog {
    pub models: Vec<ModelMetadata>,
    pub details: HashMap<String, ModelDetails>,
}

#[async_trait]
impl ModelCatalog for StaticCatalog {
    async fn models(&self) -> Result<Vec<ModelMetadata>, GatewayError> {
        Ok(self.models.clone())
    }

    async fn model_details(&self) -> Result<HashMap<String, ModelDetails>, GatewayError> {
        Ok(self.details.clone())
    }
}

#[derive(Default)]
pub struct StaticCredentials {
    pub secrets: HashMap<String, String>,
}

#[async_trait]
impl CredentialStore for StaticCredentials {
    async fn resolve(&self, reference: &str) -> Result<SecretString, GatewayError> {
        self.secrets
            .get(reference)
            .map(|s| SecretString::from(s.clone()))
            .ok_or_else(|| {
                GatewayError::Configuration(format!("unknown credential reference '{reference}'"))
            })
    }
}

#[derive(Default)]
pub struct RecordingUsage {
    pub events: Mutex<Vec<UsageEvent>>,
}

#[async_trait]
impl UsageLog for RecordingUsage {
    async fn record(&self, event: UsageEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Settings tuned for fast tests: one retry, short deadline.
pub fn test_settings() -> GatewaySettings {
    GatewaySettings {
        max_retries: 1,
        retry_total_timeout_secs: 0.5,
        retry_base_delay_ms: 1,
        ..Default::default()
    }
}

pub fn build_router(
    registry: StaticRegistry,
    catalog: StaticCatalog,
    credentials: StaticCredentials,
    usage: Arc<RecordingUsage>,
) -> GatewayRouter {
    let settings = test_settings();
    let http = build_http_client(&settings).expect("http client");
    GatewayRouter::new(
        http,
        Arc::new(registry),
        Arc::new(catalog),
        Arc::new(credentials),
        usage,
        settings,
    )
}
