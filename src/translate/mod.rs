//! Protocol translation between the canonical gateway protocol and the wire
//! dialects backend servers actually speak.
//!
//! The canonical request is the native chat shape (`model`, `messages`,
//! `stream`, `options`); the canonical stream is NDJSON chunks
//! ([`CanonicalChunk`]). Each dialect gets one stateless translator that maps
//! requests outbound and responses/streams inbound.

pub mod aggregator;
pub mod encoder;
pub mod native;
pub mod openai;
mod sse;

pub use aggregator::AggregatorTranslator;
pub use encoder::{encode_chunk_line, encode_error_line};
pub use native::NativeTranslator;
pub use openai::OpenAiCompatTranslator;

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::{CanonicalChunk, CanonicalResponse, Dialect};

/// Raw upstream body stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, GatewayError>> + Send>>;

/// Normalized stream of canonical chunks.
pub type CanonicalStream = Pin<Box<dyn Stream<Item = Result<CanonicalChunk, GatewayError>> + Send>>;

/// Per-dialect request/response/stream translation.
///
/// Translators are stateless; per-request state (thinking brackets, token
/// counting) lives inside the stream returned by [`translate_stream`].
///
/// [`translate_stream`]: DialectTranslator::translate_stream
pub trait DialectTranslator: Send + Sync {
    /// Chat completions URL for a server base URL.
    fn chat_url(&self, base_url: &str) -> String;

    /// Embeddings URL for a server base URL.
    fn embeddings_url(&self, base_url: &str) -> String;

    /// Whether dispatch must fail when no credential resolves.
    fn requires_credential(&self) -> bool {
        false
    }

    /// Authorization headers for one dispatch.
    fn auth_headers(&self, credential: Option<&SecretString>) -> Result<HeaderMap, GatewayError> {
        let mut headers = HeaderMap::new();
        if let Some(secret) = credential {
            headers.insert(AUTHORIZATION, bearer(secret)?);
        } else if self.requires_credential() {
            return Err(GatewayError::Configuration(
                "dialect requires a credential but none is configured".to_string(),
            ));
        }
        Ok(headers)
    }

    /// Map a canonical chat request onto the dialect's request shape.
    fn translate_chat_request(&self, canonical: &Value) -> Value;

    /// Map a canonical embeddings request onto the dialect's request shape.
    fn translate_embeddings_request(&self, canonical: &Value) -> Value;

    /// Parse a non-streaming chat response into the canonical shape.
    fn translate_chat_response(
        &self,
        upstream: Value,
        model: &str,
    ) -> Result<CanonicalResponse, GatewayError>;

    /// Parse an embeddings response into the canonical `{"embedding": [...]}`.
    fn translate_embeddings_response(&self, upstream: Value) -> Result<Value, GatewayError>;

    /// Normalize a live upstream body stream into canonical chunks.
    fn translate_stream(&self, bytes: ByteStream, model: String) -> CanonicalStream;
}

/// Translator singleton for a dialect.
pub fn translator_for(dialect: Dialect) -> &'static dyn DialectTranslator {
    match dialect {
        Dialect::Native => &NativeTranslator,
        Dialect::OpenAiCompat => &OpenAiCompatTranslator,
        Dialect::Aggregator => &AggregatorTranslator,
    }
}

pub(crate) fn bearer(secret: &SecretString) -> Result<HeaderValue, GatewayError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", secret.expose_secret()))
        .map_err(|_| GatewayError::Configuration("credential contains invalid header bytes".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Completion-token estimate used when the upstream reports none.
pub(crate) fn estimate_tokens(chars: usize) -> u64 {
    (chars / 4) as u64
}
