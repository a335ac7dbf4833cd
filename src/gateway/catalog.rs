//! Federated model listing.
//!
//! Queries every active native server's tag listing concurrently, deduplicates
//! by model name, and appends the synthetic `auto` entry that exposes the
//! auto-router as if it were a model.

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::GatewayError;
use crate::types::{utc_now_iso, BackendServer, Dialect};

/// Synthetic catalog entry representing the auto-router.
pub fn auto_model_entry() -> Value {
    json!({
        "name": "auto",
        "model": "auto",
        "modified_at": utc_now_iso(),
        "size": 0,
        "digest": "auto-digest-placeholder",
        "details": {
            "parent_model": "",
            "format": "gateway",
            "family": "auto",
            "families": ["auto"],
            "parameter_size": "N/A",
            "quantization_level": "N/A"
        }
    })
}

async fn fetch_tags(http: &reqwest::Client, server: &BackendServer) -> Vec<Value> {
    let url = format!("{}/api/tags", server.trimmed_base_url());
    let result = async {
        let response = http
            .get(&url)
            .send()
            .await
            .map_err(GatewayError::from_reqwest)?;
        if !response.status().is_success() {
            return Err(GatewayError::http(response.status().as_u16(), "tag listing failed"));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::Parse(format!("tag listing from {url}: {e}")))
    }
    .await;
    match result {
        Ok(body) => body
            .get("models")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        Err(e) => {
            warn!(server = %server.name, error = %e, "failed to fetch models from server");
            Vec::new()
        }
    }
}

/// List models across all active native servers, deduplicated by name, with
/// the `auto` entry appended. Unreachable servers are skipped with a warning
/// rather than failing the listing.
pub async fn federate_models(http: &reqwest::Client, servers: &[BackendServer]) -> Value {
    let native: Vec<&BackendServer> = servers
        .iter()
        .filter(|s| s.active && s.dialect == Dialect::Native)
        .collect();
    let listings = join_all(native.iter().map(|s| fetch_tags(http, s))).await;

    let mut models: Vec<Value> = Vec::new();
    for model in listings.into_iter().flatten() {
        let Some(name) = model.get("name").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        match models
            .iter_mut()
            .find(|m| m.get("name").and_then(Value::as_str) == Some(&name))
        {
            // A later server's listing replaces an earlier duplicate.
            Some(existing) => *existing = model,
            None => models.push(model),
        }
    }
    models.push(auto_model_entry());
    json!({ "models": models })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_entry_has_gateway_markers() {
        let entry = auto_model_entry();
        assert_eq!(entry["name"], "auto");
        assert_eq!(entry["details"]["format"], "gateway");
        assert!(entry["modified_at"].as_str().unwrap().ends_with('Z'));
    }
}
