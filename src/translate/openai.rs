//! OpenAI-compatible SSE dialect.
//!
//! Covers two directions: dispatch to OpenAI-compatible backend servers, and
//! the free functions at the bottom that adapt OpenAI-shaped client requests
//! and responses on the gateway's own compatibility surface.

use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::types::CanonicalResponse;

use super::sse::{sse_to_canonical, SseOptions};
use super::{ByteStream, CanonicalStream, DialectTranslator};

/// Translator for OpenAI-compatible backend servers.
pub struct OpenAiCompatTranslator;

/// Rewrite canonical messages for OpenAI-shaped payloads: a message carrying
/// a base64 `images` array becomes structured content parts. The image type
/// is unknowable from base64, so JPEG is assumed.
pub(crate) fn messages_with_image_parts(messages: &[Value]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let Some(images) = message.get("images").and_then(Value::as_array).filter(|a| !a.is_empty())
            else {
                return message.clone();
            };
            let text = message.get("content").and_then(Value::as_str).unwrap_or("");
            let mut parts = vec![json!({"type": "text", "text": text})];
            for image in images {
                if let Some(b64) = image.as_str() {
                    parts.push(json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:image/jpeg;base64,{b64}")}
                    }));
                }
            }
            let mut rewritten = message.clone();
            if let Some(obj) = rewritten.as_object_mut() {
                obj.insert("content".to_string(), Value::Array(parts));
                obj.remove("images");
            }
            rewritten
        })
        .collect()
}

fn openai_chat_response_to_canonical(
    upstream: &Value,
    model: &str,
) -> Result<CanonicalResponse, GatewayError> {
    let content = upstream
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            GatewayError::Parse("chat response missing choices[0].message.content".to_string())
        })?
        .to_string();
    let usage = upstream.get("usage");
    let prompt_tokens = usage
        .and_then(|u| u.get("prompt_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    let completion_tokens = usage
        .and_then(|u| u.get("completion_tokens"))
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;
    Ok(CanonicalResponse {
        id: upstream
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4())),
        created: upstream
            .get("created")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| chrono::Utc::now().timestamp()),
        model: upstream
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(model)
            .to_string(),
        content,
        prompt_tokens,
        completion_tokens,
        total_tokens: usage
            .and_then(|u| u.get("total_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or((prompt_tokens + completion_tokens) as u64) as u32,
    })
}

pub(crate) fn openai_embeddings_to_canonical(upstream: &Value) -> Result<Value, GatewayError> {
    let embedding = upstream
        .pointer("/data/0/embedding")
        .cloned()
        .ok_or_else(|| {
            GatewayError::Parse("embeddings response missing data[0].embedding".to_string())
        })?;
    Ok(json!({ "embedding": embedding }))
}

impl DialectTranslator for OpenAiCompatTranslator {
    fn chat_url(&self, base_url: &str) -> String {
        format!("{}/v1/chat/completions", base_url.trim_end_matches('/'))
    }

    fn embeddings_url(&self, base_url: &str) -> String {
        format!("{}/v1/embeddings", base_url.trim_end_matches('/'))
    }

    fn translate_chat_request(&self, canonical: &Value) -> Value {
        let mut payload = canonical.clone();
        if let Some(messages) = payload.get("messages").and_then(Value::as_array) {
            let rewritten = messages_with_image_parts(messages);
            payload["messages"] = Value::Array(rewritten);
        }
        payload
    }

    fn translate_embeddings_request(&self, canonical: &Value) -> Value {
        let mut payload = canonical.clone();
        if let Some(obj) = payload.as_object_mut() {
            if let Some(prompt) = obj.remove("prompt") {
                obj.insert("input".to_string(), prompt);
            }
        }
        payload
    }

    fn translate_chat_response(
        &self,
        upstream: Value,
        model: &str,
    ) -> Result<CanonicalResponse, GatewayError> {
        openai_chat_response_to_canonical(&upstream, model)
    }

    fn translate_embeddings_response(&self, upstream: Value) -> Result<Value, GatewayError> {
        openai_embeddings_to_canonical(&upstream)
    }

    fn translate_stream(&self, bytes: ByteStream, model: String) -> CanonicalStream {
        sse_to_canonical(
            bytes,
            model,
            SseOptions {
                label: "openai-compat",
                buffer_thinking_tool: true,
                honor_event_model: false,
            },
        )
    }
}

// --- Gateway-side OpenAI compatibility surface -----------------------------

/// Adapt an OpenAI-shaped client chat request into the canonical shape:
/// structured content parts collapse back into text plus an `images` array.
pub fn client_chat_to_canonical(openai_payload: &Value) -> Value {
    let mut canonical = json!({
        "model": openai_payload.get("model").cloned().unwrap_or(Value::Null),
        "stream": openai_payload.get("stream").cloned().unwrap_or(Value::Bool(false)),
    });
    let mut messages = Vec::new();
    if let Some(source) = openai_payload.get("messages").and_then(Value::as_array) {
        for message in source {
            let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
            match message.get("content") {
                Some(Value::Array(parts)) => {
                    let mut text = String::new();
                    let mut images = Vec::new();
                    for part in parts {
                        match part.get("type").and_then(Value::as_str) {
                            Some("text") => {
                                if let Some(t) = part.get("text").and_then(Value::as_str) {
                                    text.push_str(t);
                                }
                            }
                            Some("image_url") => {
                                let url = part
                                    .pointer("/image_url/url")
                                    .and_then(Value::as_str)
                                    .unwrap_or("");
                                if url.starts_with("data:image") {
                                    if let Some((_, b64)) = url.rsplit_once(',') {
                                        images.push(Value::String(b64.to_string()));
                                    }
                                }
                            }
                            _ => {}
                        }
                    }
                    let mut msg = json!({"role": role, "content": text});
                    if !images.is_empty() {
                        msg["images"] = Value::Array(images);
                    }
                    messages.push(msg);
                }
                Some(content) => messages.push(json!({"role": role, "content": content})),
                None => messages.push(json!({"role": role, "content": ""})),
            }
        }
    }
    canonical["messages"] = Value::Array(messages);
    // Sampling parameters ride in `options` on the canonical shape;
    // `max_tokens` becomes `num_predict` there.
    let mut options = serde_json::Map::new();
    if let Some(v) = openai_payload.get("temperature") {
        options.insert("temperature".to_string(), v.clone());
    }
    if let Some(v) = openai_payload.get("top_p") {
        options.insert("top_p".to_string(), v.clone());
    }
    if let Some(v) = openai_payload.get("max_tokens") {
        options.insert("num_predict".to_string(), v.clone());
    }
    if !options.is_empty() {
        canonical["options"] = Value::Object(options);
    }
    for key in ["tools", "tool_choice"] {
        if let Some(v) = openai_payload.get(key) {
            canonical[key] = v.clone();
        }
    }
    canonical
}

/// Render a canonical response in the OpenAI chat-completion shape for the
/// gateway's compatibility surface.
pub fn canonical_response_to_client(response: &CanonicalResponse) -> Value {
    json!({
        "id": response.id,
        "object": "chat.completion",
        "created": response.created,
        "model": response.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": response.content},
            "finish_reason": "stop"
        }],
        "usage": {
            "prompt_tokens": response.prompt_tokens,
            "completion_tokens": response.completion_tokens,
            "total_tokens": response.total_tokens
        }
    })
}

/// Adapt an OpenAI-shaped embeddings request (`input`) to canonical (`prompt`).
pub fn client_embeddings_to_canonical(openai_payload: &Value) -> Value {
    let mut canonical = openai_payload.clone();
    if let Some(obj) = canonical.as_object_mut() {
        if let Some(input) = obj.remove("input") {
            obj.insert("prompt".to_string(), input);
        }
    }
    canonical
}
