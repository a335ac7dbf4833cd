//! Aggregator dialect: OpenAI-shaped wire format plus aggregator-specific
//! routing parameters, a mandatory credential, and attribution headers.
//!
//! Unlike the OpenAI-compatible dialect, outbound requests are rebuilt from a
//! whitelist rather than cloned wholesale, so backend-only fields like
//! `options` never leak upstream. Streams pass thinking text through
//! unmarked, since aggregated models interleave reasoning in content.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use secrecy::SecretString;
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::types::CanonicalResponse;

use super::openai::{messages_with_image_parts, openai_embeddings_to_canonical};
use super::sse::{sse_to_canonical, SseOptions};
use super::{bearer, ByteStream, CanonicalStream, DialectTranslator, OpenAiCompatTranslator};

/// Standard sampling parameters copied through when present.
const STANDARD_PARAMS: &[&str] = &[
    "temperature",
    "max_tokens",
    "top_p",
    "top_k",
    "frequency_penalty",
    "presence_penalty",
    "stop",
    "seed",
    "tools",
    "tool_choice",
];

/// Aggregator-specific routing parameters forwarded verbatim.
const AGGREGATOR_PARAMS: &[&str] = &["transforms", "models", "route", "provider", "user"];

/// Translator for third-party aggregator servers.
pub struct AggregatorTranslator;

impl AggregatorTranslator {
    /// Attribution headers identifying the gateway to the aggregator.
    pub fn attribution_headers(
        referer: Option<&str>,
        title: Option<&str>,
    ) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        if let Some(referer) = referer {
            headers.insert(
                HeaderName::from_static("http-referer"),
                HeaderValue::from_str(referer).map_err(|_| {
                    GatewayError::Configuration("invalid aggregator referer header".to_string())
                })?,
            );
        }
        if let Some(title) = title {
            headers.insert(
                HeaderName::from_static("x-title"),
                HeaderValue::from_str(title).map_err(|_| {
                    GatewayError::Configuration("invalid aggregator title header".to_string())
                })?,
            );
        }
        Ok(headers)
    }
}

impl DialectTranslator for AggregatorTranslator {
    fn chat_url(&self, base_url: &str) -> String {
        format!("{}/chat/completions", base_url.trim_end_matches('/'))
    }

    fn embeddings_url(&self, base_url: &str) -> String {
        format!("{}/embeddings", base_url.trim_end_matches('/'))
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn auth_headers(&self, credential: Option<&SecretString>) -> Result<HeaderMap, GatewayError> {
        let secret = credential.ok_or_else(|| {
            GatewayError::Configuration(
                "aggregator server has no credential configured".to_string(),
            )
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer(secret)?);
        Ok(headers)
    }

    fn translate_chat_request(&self, canonical: &Value) -> Value {
        let mut payload = json!({
            "model": canonical.get("model").cloned().unwrap_or(Value::Null),
            "stream": canonical.get("stream").cloned().unwrap_or(Value::Bool(false)),
            "messages": Value::Array(
                canonical
                    .get("messages")
                    .and_then(Value::as_array)
                    .map(|m| messages_with_image_parts(m))
                    .unwrap_or_default(),
            ),
        });
        for key in STANDARD_PARAMS.iter().chain(AGGREGATOR_PARAMS) {
            if let Some(v) = canonical.get(*key) {
                payload[*key] = v.clone();
            }
        }
        payload
    }

    fn translate_embeddings_request(&self, canonical: &Value) -> Value {
        let input = canonical
            .get("prompt")
            .or_else(|| canonical.get("input"))
            .cloned()
            .unwrap_or(Value::Null);
        let mut payload = json!({
            "model": canonical.get("model").cloned().unwrap_or(Value::Null),
            "input": input,
        });
        for key in AGGREGATOR_PARAMS {
            if let Some(v) = canonical.get(*key) {
                payload[*key] = v.clone();
            }
        }
        payload
    }

    fn translate_chat_response(
        &self,
        upstream: Value,
        model: &str,
    ) -> Result<CanonicalResponse, GatewayError> {
        // Same wire shape as the OpenAI-compatible dialect.
        OpenAiCompatTranslator.translate_chat_response(upstream, model)
    }

    fn translate_embeddings_response(&self, upstream: Value) -> Result<Value, GatewayError> {
        openai_embeddings_to_canonical(&upstream)
    }

    fn translate_stream(&self, bytes: ByteStream, model: String) -> CanonicalStream {
        sse_to_canonical(
            bytes,
            model,
            SseOptions {
                label: "aggregator",
                buffer_thinking_tool: false,
                honor_event_model: true,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_is_rebuilt_from_whitelist() {
        let canonical = json!({
            "model": "auto",
            "stream": true,
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.7,
            "route": "fallback",
            "models": ["a", "b"],
            "options": {"num_ctx": 4096},
            "keep_alive": "5m"
        });
        let payload = AggregatorTranslator.translate_chat_request(&canonical);
        assert_eq!(payload["temperature"], 0.7);
        assert_eq!(payload["route"], "fallback");
        assert_eq!(payload["models"][1], "b");
        // Backend-only fields never leak upstream.
        assert!(payload.get("options").is_none());
        assert!(payload.get("keep_alive").is_none());
    }

    #[test]
    fn embeddings_request_accepts_prompt_or_input() {
        let a = AggregatorTranslator
            .translate_embeddings_request(&json!({"model": "e", "prompt": "x"}));
        assert_eq!(a["input"], "x");
        let b = AggregatorTranslator
            .translate_embeddings_request(&json!({"model": "e", "input": ["x", "y"]}));
        assert_eq!(b["input"][1], "y");
    }

    #[test]
    fn credential_is_mandatory() {
        let err = AggregatorTranslator.auth_headers(None).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(_)));
        let headers = AggregatorTranslator
            .auth_headers(Some(&SecretString::from("sk-or-v1-abc")))
            .unwrap();
        assert!(headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn attribution_headers_are_optional() {
        let headers =
            AggregatorTranslator::attribution_headers(Some("https://gw.example"), Some("Gateway"))
                .unwrap();
        assert_eq!(headers.get("http-referer").unwrap(), "https://gw.example");
        assert_eq!(headers.get("x-title").unwrap(), "Gateway");
        assert!(AggregatorTranslator::attribution_headers(None, None)
            .unwrap()
            .is_empty());
    }
}
