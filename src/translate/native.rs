//! Native NDJSON dialect.
//!
//! The canonical request IS the native chat shape, so outbound translation is
//! a passthrough. Inbound streams are re-framed line by line: upstream
//! `thinking` deltas are folded into the content channel between `<think>`
//! and `</think>` markers, and the final chunk's statistics are synthesized
//! when the upstream omits them.

use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::warn;

use crate::error::GatewayError;
use crate::types::{CanonicalChunk, CanonicalResponse};

use super::{estimate_tokens, ByteStream, CanonicalStream, DialectTranslator};

/// Translator for servers speaking the native NDJSON protocol.
pub struct NativeTranslator;

#[derive(Debug, Deserialize)]
struct NativeFrame {
    model: Option<String>,
    message: Option<NativeFrameMessage>,
    #[serde(default)]
    done: bool,
    eval_count: Option<u64>,
    eval_duration: Option<u64>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NativeFrameMessage {
    content: Option<String>,
    thinking: Option<String>,
}

impl DialectTranslator for NativeTranslator {
    fn chat_url(&self, base_url: &str) -> String {
        format!("{}/api/chat", base_url.trim_end_matches('/'))
    }

    fn embeddings_url(&self, base_url: &str) -> String {
        format!("{}/api/embeddings", base_url.trim_end_matches('/'))
    }

    fn translate_chat_request(&self, canonical: &Value) -> Value {
        canonical.clone()
    }

    fn translate_embeddings_request(&self, canonical: &Value) -> Value {
        canonical.clone()
    }

    fn translate_chat_response(
        &self,
        upstream: Value,
        model: &str,
    ) -> Result<CanonicalResponse, GatewayError> {
        let content = upstream
            .pointer("/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                GatewayError::Parse("native chat response missing message.content".to_string())
            })?
            .to_string();
        let prompt_tokens = upstream
            .get("prompt_eval_count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        // Unreported usage stays zero; the chars/4 estimate is a streaming-only
        // fallback for the synthesized terminal chunk.
        let completion_tokens = upstream
            .get("eval_count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;
        Ok(CanonicalResponse {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            created: chrono::Utc::now().timestamp(),
            model: upstream
                .get("model")
                .and_then(Value::as_str)
                .unwrap_or(model)
                .to_string(),
            content,
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        })
    }

    fn translate_embeddings_response(&self, upstream: Value) -> Result<Value, GatewayError> {
        let embedding = upstream
            .get("embedding")
            .cloned()
            .ok_or_else(|| GatewayError::Parse("native embeddings response missing 'embedding'".to_string()))?;
        Ok(serde_json::json!({ "embedding": embedding }))
    }

    fn translate_stream(&self, bytes: ByteStream, model: String) -> CanonicalStream {
        let out = async_stream::stream! {
            let start = Instant::now();
            let mut total_chars = 0usize;
            let mut thinking_open = false;

            let io_stream = bytes.map(|res| {
                res.map_err(|e| std::io::Error::other(e.to_string()))
            });
            let reader = StreamReader::new(io_stream);
            let mut lines = FramedRead::new(reader, LinesCodec::new());

            while let Some(item) = lines.next().await {
                let line = match item {
                    Ok(line) => line,
                    Err(e) => {
                        yield Err(GatewayError::Stream(format!("NDJSON line error: {e}")));
                        return;
                    }
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let frame: NativeFrame = match serde_json::from_str(trimmed) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(error = %e, "skipping malformed native stream line");
                        continue;
                    }
                };
                if let Some(error) = frame.error {
                    yield Err(GatewayError::Stream(format!("upstream reported error: {error}")));
                    return;
                }
                let reported = frame.model.as_deref().unwrap_or(&model).to_string();

                if let Some(message) = &frame.message {
                    if let Some(thinking) = message.thinking.as_deref().filter(|t| !t.is_empty()) {
                        let text = if thinking_open {
                            thinking.to_string()
                        } else {
                            thinking_open = true;
                            format!("<think>{thinking}")
                        };
                        total_chars += text.chars().count();
                        yield Ok(CanonicalChunk::content(&reported, text));
                    }
                    if let Some(content) = message.content.as_deref().filter(|c| !c.is_empty()) {
                        if thinking_open {
                            thinking_open = false;
                            total_chars += "</think>".len();
                            yield Ok(CanonicalChunk::content(&reported, "</think>"));
                        }
                        total_chars += content.chars().count();
                        yield Ok(CanonicalChunk::content(&reported, content.to_string()));
                    }
                }

                if frame.done {
                    if thinking_open {
                        yield Ok(CanonicalChunk::content(&reported, "</think>"));
                    }
                    let eval_count = match frame.eval_count {
                        Some(count) => count,
                        None => {
                            warn!(model = %reported, "upstream omitted eval_count, synthesizing");
                            estimate_tokens(total_chars)
                        }
                    };
                    let eval_duration = frame
                        .eval_duration
                        .unwrap_or_else(|| start.elapsed().as_nanos() as u64);
                    yield Ok(CanonicalChunk::done(&reported, eval_count, eval_duration));
                    return;
                }
            }

            // Upstream closed without a terminal frame; synthesize one so the
            // canonical stream still ends with exactly one done chunk.
            if thinking_open {
                yield Ok(CanonicalChunk::content(&model, "</think>"));
            }
            warn!(model = %model, "upstream stream ended without done frame");
            yield Ok(CanonicalChunk::done(
                &model,
                estimate_tokens(total_chars),
                start.elapsed().as_nanos() as u64,
            ));
        };
        Box::pin(out)
    }
}
