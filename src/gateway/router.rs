//! Gateway router: resolves models, picks candidate servers, dispatches with
//! retry, and fails over across servers.
//!
//! Server failover handles infrastructure faults (a server is down); model
//! failover for streaming `auto` requests lives in [`super::failover`] and
//! recovers from model-level faults on top of this layer.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::StreamExt;
use secrecy::SecretString;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analyzer::RequirementProfile;
use crate::config::GatewaySettings;
use crate::error::{classify_upstream, GatewayError};
use crate::retry::RetryExecutor;
use crate::routing::{select_best_model, PriorityMode};
use crate::translate::{
    translator_for, AggregatorTranslator, ByteStream, CanonicalStream, DialectTranslator,
};
use crate::types::{BackendServer, CanonicalResponse, Dialect};

use super::registry::{CredentialStore, ModelCatalog, ServerRegistry, UsageEvent, UsageLog};
use super::{catalog, failover};

/// Per-request identity and routing posture.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub api_key_id: i64,
    pub endpoint: String,
    pub priority_mode: PriorityMode,
}

impl RequestContext {
    pub fn new(api_key_id: i64, endpoint: impl Into<String>, priority_mode: PriorityMode) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            api_key_id,
            endpoint: endpoint.into(),
            priority_mode,
        }
    }
}

/// The gateway core. Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct GatewayRouter {
    http: reqwest::Client,
    pub(crate) registry: Arc<dyn ServerRegistry>,
    pub(crate) catalog: Arc<dyn ModelCatalog>,
    credentials: Arc<dyn CredentialStore>,
    pub(crate) usage: Arc<dyn UsageLog>,
    settings: GatewaySettings,
}

impl GatewayRouter {
    pub fn new(
        http: reqwest::Client,
        registry: Arc<dyn ServerRegistry>,
        catalog: Arc<dyn ModelCatalog>,
        credentials: Arc<dyn CredentialStore>,
        usage: Arc<dyn UsageLog>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            http,
            registry,
            catalog,
            credentials,
            usage,
            settings,
        }
    }

    /// Non-streaming chat. `auto` resolves to a concrete model before
    /// dispatch; candidate servers are tried in order until one succeeds.
    pub async fn chat(
        &self,
        ctx: &RequestContext,
        mut body: Value,
    ) -> Result<CanonicalResponse, GatewayError> {
        let mut model = required_model(&body)?;
        if model == "auto" {
            model = self
                .resolve_auto(&body, ctx.priority_mode, &HashSet::new())
                .await?;
            body["model"] = Value::String(model.clone());
        }

        let candidates = self.candidate_servers(&model).await?;
        let mut last_error: Option<GatewayError> = None;
        for server in &candidates {
            match self.dispatch_chat(ctx, server, &model, &body).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    warn!(
                        server = %server.name,
                        model = %model,
                        error = %e,
                        "chat dispatch failed, trying next server"
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(exhausted(&model, candidates.len(), last_error))
    }

    /// Streaming chat. A concrete model streams with server failover only;
    /// `auto` additionally falls back across models mid-selection (never
    /// mid-stream once bytes have flowed) via the failover state machine.
    pub async fn chat_stream(
        &self,
        ctx: &RequestContext,
        mut body: Value,
    ) -> Result<CanonicalStream, GatewayError> {
        let model = required_model(&body)?;
        if let Some(obj) = body.as_object_mut() {
            obj.insert("stream".to_string(), Value::Bool(true));
        }
        if model == "auto" {
            return Ok(failover::auto_stream(self.clone(), ctx.clone(), body));
        }
        self.open_stream_with_failover(ctx, &model, &body).await
    }

    /// Embeddings with the same candidate/failover discipline as chat.
    pub async fn embeddings(
        &self,
        ctx: &RequestContext,
        body: Value,
    ) -> Result<Value, GatewayError> {
        let model = required_model(&body)?;
        let candidates = self.candidate_servers(&model).await?;
        let mut last_error: Option<GatewayError> = None;
        for server in &candidates {
            let translator = translator_for(server.dialect);
            let payload = translator.translate_embeddings_request(&body);
            let url = translator.embeddings_url(server.trimmed_base_url());
            match self.dispatch_json(server, translator, &url, &model, payload).await {
                Ok(upstream) => {
                    let canonical = translator.translate_embeddings_response(upstream)?;
                    self.record(ctx, 200, Some(server.id), Some(model.as_str())).await;
                    return Ok(canonical);
                }
                Err(e) => {
                    warn!(server = %server.name, error = %e, "embeddings dispatch failed");
                    last_error = Some(e);
                }
            }
        }
        Err(exhausted(&model, candidates.len(), last_error))
    }

    /// Federated model listing across active native servers, including the
    /// synthetic `auto` entry.
    pub async fn list_models(&self, ctx: &RequestContext) -> Result<Value, GatewayError> {
        let servers = self.registry.active_servers().await?;
        let listing = catalog::federate_models(&self.http, &servers).await;
        self.record(ctx, 200, None, None).await;
        Ok(listing)
    }

    /// Run the auto-router against the catalog for this request body.
    pub(crate) async fn resolve_auto(
        &self,
        body: &Value,
        mode: PriorityMode,
        excluded: &HashSet<String>,
    ) -> Result<String, GatewayError> {
        let profile = RequirementProfile::from_body(body);
        let models = self.catalog.models().await?;
        let details = self.catalog.model_details().await?;
        let selection = select_best_model(&models, &profile, mode, &details, excluded)
            .ok_or_else(|| GatewayError::Exhausted {
                subject: "auto".to_string(),
                detail: "no routable models in catalog".to_string(),
            })?;
        Ok(selection.metadata.model_name)
    }

    /// Ordered candidate servers for a model: servers advertising the model
    /// first, falling back to every active server when none does.
    pub(crate) async fn candidate_servers(
        &self,
        model: &str,
    ) -> Result<Vec<BackendServer>, GatewayError> {
        let with_model = self.registry.servers_with_model(model).await?;
        if !with_model.is_empty() {
            info!(model, count = with_model.len(), "routing to servers advertising model");
            return Ok(with_model);
        }
        let active = self.registry.active_servers().await?;
        if active.is_empty() {
            return Err(GatewayError::Exhausted {
                subject: model.to_string(),
                detail: "no active backend servers".to_string(),
            });
        }
        warn!(
            model,
            count = active.len(),
            "model not in any server catalog, falling back to all active servers"
        );
        Ok(active)
    }

    /// Try each candidate server until one opens a canonical stream.
    ///
    /// A model-not-found from any candidate outranks other failures in the
    /// returned error so that auto-routing reselects instead of giving up.
    pub(crate) async fn open_stream_with_failover(
        &self,
        ctx: &RequestContext,
        model: &str,
        body: &Value,
    ) -> Result<CanonicalStream, GatewayError> {
        let candidates = self.candidate_servers(model).await?;
        let mut last_error: Option<GatewayError> = None;
        let mut model_error: Option<GatewayError> = None;
        for server in &candidates {
            match self.open_upstream_stream(server, model, body).await {
                Ok(stream) => {
                    self.record(ctx, 200, Some(server.id), Some(model)).await;
                    return Ok(stream);
                }
                Err(e) => {
                    warn!(
                        server = %server.name,
                        model,
                        error = %e,
                        "stream open failed, trying next server"
                    );
                    if e.is_model_not_found() && model_error.is_none() {
                        model_error = Some(e);
                    } else {
                        last_error = Some(e);
                    }
                }
            }
        }
        match model_error {
            Some(e) => Err(e),
            None => Err(exhausted(model, candidates.len(), last_error)),
        }
    }

    async fn dispatch_chat(
        &self,
        ctx: &RequestContext,
        server: &BackendServer,
        model: &str,
        body: &Value,
    ) -> Result<CanonicalResponse, GatewayError> {
        let translator = translator_for(server.dialect);
        let payload = translator.translate_chat_request(body);
        let url = translator.chat_url(server.trimmed_base_url());
        let upstream = self.dispatch_json(server, translator, &url, model, payload).await?;
        let response = translator.translate_chat_response(upstream, model)?;
        self.record(ctx, 200, Some(server.id), Some(model)).await;
        Ok(response)
    }

    /// POST a JSON payload with transport-level retry; a non-2xx status is
    /// classified but never retried.
    async fn dispatch_json(
        &self,
        server: &BackendServer,
        translator: &dyn DialectTranslator,
        url: &str,
        model: &str,
        payload: Value,
    ) -> Result<Value, GatewayError> {
        let headers = self.headers_for(server, translator).await?;
        let retry = RetryExecutor::new(self.settings.retry_config());
        let outcome = retry
            .execute("upstream dispatch", || {
                let request = self
                    .http
                    .post(url)
                    .headers(headers.clone())
                    .json(&payload);
                async move { request.send().await.map_err(GatewayError::from_reqwest) }
            })
            .await;
        let response = outcome.result?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_upstream(model, status.as_u16(), &text));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| GatewayError::Parse(format!("upstream response from {url}: {e}")))
    }

    /// Open a streaming request against one server and normalize its body.
    async fn open_upstream_stream(
        &self,
        server: &BackendServer,
        model: &str,
        body: &Value,
    ) -> Result<CanonicalStream, GatewayError> {
        let translator = translator_for(server.dialect);
        let payload = translator.translate_chat_request(body);
        let url = translator.chat_url(server.trimmed_base_url());
        let headers = self.headers_for(server, translator).await?;

        let retry = RetryExecutor::new(self.settings.retry_config());
        let outcome = retry
            .execute("stream open", || {
                let request = self
                    .http
                    .post(&url)
                    .headers(headers.clone())
                    .json(&payload);
                async move { request.send().await.map_err(GatewayError::from_reqwest) }
            })
            .await;
        let response = outcome.result?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_upstream(model, status.as_u16(), &text));
        }
        // Dropping the returned stream drops this body stream, which aborts
        // the upstream connection; client disconnect propagates naturally.
        let bytes: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|r| r.map_err(|e| GatewayError::Stream(format!("upstream body error: {e}")))),
        );
        Ok(translator.translate_stream(bytes, model.to_string()))
    }

    async fn headers_for(
        &self,
        server: &BackendServer,
        translator: &dyn DialectTranslator,
    ) -> Result<reqwest::header::HeaderMap, GatewayError> {
        let credential = self.server_credential(server).await?;
        let mut headers = translator.auth_headers(credential.as_ref())?;
        if server.dialect == Dialect::Aggregator {
            let attribution = AggregatorTranslator::attribution_headers(
                self.settings.aggregator_referer.as_deref(),
                self.settings.aggregator_title.as_deref(),
            )?;
            headers.extend(attribution);
        }
        Ok(headers)
    }

    async fn server_credential(
        &self,
        server: &BackendServer,
    ) -> Result<Option<SecretString>, GatewayError> {
        match &server.credential_ref {
            Some(reference) => Ok(Some(self.credentials.resolve(reference).await?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn record(
        &self,
        ctx: &RequestContext,
        status_code: u16,
        server_id: Option<i64>,
        model: Option<&str>,
    ) {
        self.usage
            .record(UsageEvent {
                request_id: ctx.request_id,
                api_key_id: ctx.api_key_id,
                endpoint: ctx.endpoint.clone(),
                status_code,
                server_id,
                model: model.map(str::to_string),
            })
            .await;
    }
}

fn required_model(body: &Value) -> Result<String, GatewayError> {
    body.get("model")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::Configuration("request body is missing 'model'".to_string()))
}

fn exhausted(model: &str, tried: usize, last_error: Option<GatewayError>) -> GatewayError {
    match last_error {
        // Preserve model-not-found classification so auto-routing can react.
        Some(e) if e.is_model_not_found() => e,
        Some(e) => GatewayError::Exhausted {
            subject: model.to_string(),
            detail: format!("{tried} candidate server(s) failed; last error: {e}"),
        },
        None => GatewayError::Exhausted {
            subject: model.to_string(),
            detail: "no candidate servers".to_string(),
        },
    }
}
