//! Mid-selection model fallback for streaming `auto` requests.
//!
//! State machine: select a model, try to open its stream (with server
//! failover underneath); a model-level failure excludes the model and
//! reselects; any other failure — or any failure after bytes have already
//! been relayed — is reported in-band and terminates the request. Fallback
//! therefore never splices two models into one response.

use std::collections::HashSet;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::{info, warn};

use crate::translate::CanonicalStream;
use crate::types::CanonicalChunk;

use super::router::{GatewayRouter, RequestContext};

pub(crate) fn auto_stream(
    router: GatewayRouter,
    ctx: RequestContext,
    body: Value,
) -> CanonicalStream {
    let out = async_stream::stream! {
        let mut excluded: HashSet<String> = HashSet::new();
        let mut tried: Vec<String> = Vec::new();

        loop {
            let model = match router.resolve_auto(&body, ctx.priority_mode, &excluded).await {
                Ok(model) => model,
                Err(e) => {
                    let detail = if tried.is_empty() {
                        e.to_string()
                    } else {
                        format!("{e}; models tried: {}", tried.join(", "))
                    };
                    warn!(error = %detail, "auto routing exhausted");
                    router.record(&ctx, 503, None, None).await;
                    yield Ok(CanonicalChunk::error_frame("auto", format!("auto routing failed: {detail}")));
                    return;
                }
            };
            excluded.insert(model.clone());
            tried.push(model.clone());

            let mut attempt_body = body.clone();
            attempt_body["model"] = Value::String(model.clone());

            match router.open_stream_with_failover(&ctx, &model, &attempt_body).await {
                Ok(mut upstream) => {
                    if tried.len() > 1 {
                        info!(model = %model, attempt = tried.len(), "auto fallback succeeded");
                    }
                    while let Some(item) = upstream.next().await {
                        match item {
                            Ok(chunk) => yield Ok(chunk),
                            // Bytes already flowed; no reselection, report
                            // in-band and stop.
                            Err(e) => {
                                warn!(model = %model, error = %e, "stream failed mid-flight");
                                yield Ok(CanonicalChunk::error_frame(&model, e.to_string()));
                                return;
                            }
                        }
                    }
                    return;
                }
                Err(e) if e.is_model_not_found() => {
                    warn!(model = %model, error = %e, "model rejected upstream, reselecting");
                    continue;
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "auto stream failed terminally");
                    router.record(&ctx, 502, None, Some(model.as_str())).await;
                    yield Ok(CanonicalChunk::error_frame(&model, e.to_string()));
                    return;
                }
            }
        }
    };
    Box::pin(out)
}
