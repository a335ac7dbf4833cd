//! Shared SSE-to-canonical stream normalization.
//!
//! Both OpenAI-compatible servers and the aggregator emit `data:` events
//! carrying chat-completion chunk JSON, terminated by `data: [DONE]`. This
//! module re-frames those events as canonical NDJSON chunks and synthesizes
//! the terminal statistics, since SSE upstreams report none in our shape.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::warn;

use crate::error::GatewayError;
use crate::types::CanonicalChunk;

use super::{estimate_tokens, ByteStream, CanonicalStream};

/// Dialect-specific SSE handling switches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SseOptions {
    /// Label used in stream error messages
    pub label: &'static str,
    /// Buffer thinking-named tool-call argument fragments and emit them as a
    /// bracketed block on the tool finish signal
    pub buffer_thinking_tool: bool,
    /// Adopt the model name reported inside events (aggregators resolve
    /// model aliases server-side)
    pub honor_event_model: bool,
}

fn is_thinking_tool(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("think") || lower.contains("reason")
}

/// Join the buffered tool arguments into display text. The buffer is expected
/// to be a JSON object with a `steps` array; anything else passes through raw.
fn render_thinking_buffer(buffer: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(buffer) {
        if let Some(steps) = value.get("steps").and_then(Value::as_array) {
            let lines: Vec<&str> = steps.iter().filter_map(Value::as_str).collect();
            if !lines.is_empty() {
                return lines.join("\n");
            }
        }
    }
    buffer.to_string()
}

pub(crate) fn sse_to_canonical(
    bytes: ByteStream,
    fallback_model: String,
    opts: SseOptions,
) -> CanonicalStream {
    let out = async_stream::stream! {
        let start = Instant::now();
        let mut total_chars = 0usize;
        let mut event_model: Option<String> = None;
        let mut tool_buffer = String::new();
        let mut tool_is_thinking = false;

        let mut events = bytes.eventsource();
        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield Err(GatewayError::Stream(format!(
                        "SSE stream error ({}): {e}",
                        opts.label
                    )));
                    return;
                }
            };
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                let model = event_model.as_deref().unwrap_or(&fallback_model);
                yield Ok(CanonicalChunk::done(
                    model,
                    estimate_tokens(total_chars),
                    start.elapsed().as_nanos() as u64,
                ));
                return;
            }
            let value: Value = match serde_json::from_str(data) {
                Ok(value) => value,
                Err(e) => {
                    warn!(label = opts.label, error = %e, "skipping malformed SSE data");
                    continue;
                }
            };
            if let Some(error) = value.get("error") {
                let detail = error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                yield Err(GatewayError::Stream(format!(
                    "upstream reported error ({}): {detail}",
                    opts.label
                )));
                return;
            }
            if opts.honor_event_model {
                if let Some(m) = value.get("model").and_then(Value::as_str) {
                    event_model = Some(m.to_string());
                }
            }
            let model = event_model.as_deref().unwrap_or(&fallback_model).to_string();

            let choice = value.pointer("/choices/0");
            let delta = choice.and_then(|c| c.get("delta"));

            if let Some(content) = delta
                .and_then(|d| d.get("content"))
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
            {
                total_chars += content.chars().count();
                yield Ok(CanonicalChunk::content(&model, content.to_string()));
            }

            if opts.buffer_thinking_tool {
                if let Some(calls) = delta.and_then(|d| d.get("tool_calls")).and_then(Value::as_array) {
                    for call in calls {
                        if let Some(name) = call.pointer("/function/name").and_then(Value::as_str) {
                            if is_thinking_tool(name) {
                                tool_is_thinking = true;
                            }
                        }
                        if tool_is_thinking {
                            if let Some(args) = call.pointer("/function/arguments").and_then(Value::as_str) {
                                tool_buffer.push_str(args);
                            }
                        }
                    }
                }
                let finish = choice
                    .and_then(|c| c.get("finish_reason"))
                    .and_then(Value::as_str);
                if finish == Some("tool_calls") && tool_is_thinking && !tool_buffer.is_empty() {
                    let rendered = render_thinking_buffer(&tool_buffer);
                    total_chars += rendered.chars().count() + "<think></think>".len();
                    yield Ok(CanonicalChunk::content(&model, format!("<think>{rendered}")));
                    yield Ok(CanonicalChunk::content(&model, "</think>"));
                    tool_buffer.clear();
                    tool_is_thinking = false;
                }
            }
        }

        // Upstream closed without [DONE]; still end the canonical stream with
        // exactly one terminal chunk.
        warn!(label = opts.label, "SSE stream ended without [DONE]");
        let model = event_model.as_deref().unwrap_or(&fallback_model);
        yield Ok(CanonicalChunk::done(
            model,
            estimate_tokens(total_chars),
            start.elapsed().as_nanos() as u64,
        ));
    };
    Box::pin(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn sse_bytes(events: &[&str]) -> ByteStream {
        let chunks: Vec<Result<bytes::Bytes, GatewayError>> = events
            .iter()
            .map(|e| Ok(bytes::Bytes::from(format!("data: {e}\n\n"))))
            .collect();
        Box::pin(stream::iter(chunks))
    }

    fn opts() -> SseOptions {
        SseOptions {
            label: "test",
            buffer_thinking_tool: true,
            honor_event_model: false,
        }
    }

    async fn collect(stream: CanonicalStream) -> Vec<CanonicalChunk> {
        stream.map(|r| r.expect("stream item")).collect().await
    }

    #[tokio::test]
    async fn content_deltas_become_chunks_and_done_gets_stats() {
        let chunks = collect(sse_to_canonical(
            sse_bytes(&[
                r#"{"choices":[{"delta":{"content":"12345678"}}]}"#,
                r#"{"choices":[{"delta":{"content":"9012"}}]}"#,
                "[DONE]",
            ]),
            "vllm-model".to_string(),
            opts(),
        ))
        .await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].message.content, "12345678");
        assert!(chunks[2].done);
        // 12 content chars -> floor(12 / 4) = 3 tokens
        assert_eq!(chunks[2].eval_count, Some(3));
        assert!(chunks[2].eval_duration.is_some());
    }

    #[tokio::test]
    async fn thinking_tool_arguments_are_buffered_and_bracketed() {
        let chunks = collect(sse_to_canonical(
            sse_bytes(&[
                r#"{"choices":[{"delta":{"tool_calls":[{"function":{"name":"deep_thinking","arguments":"{\"steps\":"}}]}}]}"#,
                r#"{"choices":[{"delta":{"tool_calls":[{"function":{"arguments":"[\"plan\",\"solve\"]}"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                r#"{"choices":[{"delta":{"content":"final answer"}}]}"#,
                "[DONE]",
            ]),
            "m".to_string(),
            opts(),
        ))
        .await;
        let contents: Vec<&str> = chunks.iter().map(|c| c.message.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["<think>plan\nsolve", "</think>", "final answer", ""]
        );
    }

    #[tokio::test]
    async fn unparseable_tool_buffer_passes_through_raw() {
        let chunks = collect(sse_to_canonical(
            sse_bytes(&[
                r#"{"choices":[{"delta":{"tool_calls":[{"function":{"name":"reasoning","arguments":"partial {json"}}]}}]}"#,
                r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
                "[DONE]",
            ]),
            "m".to_string(),
            opts(),
        ))
        .await;
        assert_eq!(chunks[0].message.content, "<think>partial {json");
        assert_eq!(chunks[1].message.content, "</think>");
    }

    #[tokio::test]
    async fn event_model_overrides_fallback_when_honored() {
        let chunks = collect(sse_to_canonical(
            sse_bytes(&[
                r#"{"model":"resolved/model-v2","choices":[{"delta":{"content":"hi"}}]}"#,
                "[DONE]",
            ]),
            "auto".to_string(),
            SseOptions {
                label: "test",
                buffer_thinking_tool: false,
                honor_event_model: true,
            },
        ))
        .await;
        assert_eq!(chunks[0].model, "resolved/model-v2");
        assert_eq!(chunks[1].model, "resolved/model-v2");
    }

    #[tokio::test]
    async fn split_sse_frames_reassemble() {
        let chunks: Vec<Result<bytes::Bytes, GatewayError>> = vec![
            Ok(bytes::Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"co")),
            Ok(bytes::Bytes::from_static(b"ntent\":\"hello\"}}]}\n\ndata: [DONE]\n\n")),
        ];
        let chunks = collect(sse_to_canonical(
            Box::pin(stream::iter(chunks)),
            "m".to_string(),
            opts(),
        ))
        .await;
        assert_eq!(chunks[0].message.content, "hello");
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn missing_done_marker_still_terminates() {
        let chunks = collect(sse_to_canonical(
            sse_bytes(&[r#"{"choices":[{"delta":{"content":"cut off"}}]}"#]),
            "m".to_string(),
            opts(),
        ))
        .await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].done);
    }

    #[tokio::test]
    async fn upstream_error_event_fails_the_stream() {
        let mut stream = sse_to_canonical(
            sse_bytes(&[r#"{"error":{"message":"capacity exceeded"}}"#]),
            "m".to_string(),
            opts(),
        );
        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(GatewayError::Stream(ref msg)) if msg.contains("capacity")));
        assert!(stream.next().await.is_none());
    }
}
