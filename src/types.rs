//! Core data types shared across the gateway: wire dialects, backend server
//! descriptors, the routing catalog entries, and the canonical stream chunk.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Wire dialect spoken by a backend server.
///
/// The set is closed: every routing and translation decision matches
/// exhaustively on it, so adding a dialect is a compile-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Newline-delimited JSON chat/embeddings protocol (`/api/chat`)
    Native,
    /// OpenAI-compatible SSE protocol (`/v1/chat/completions`)
    #[serde(rename = "openai_compat")]
    OpenAiCompat,
    /// Third-party aggregator: OpenAI-shaped with extra routing parameters
    Aggregator,
}

impl Dialect {
    /// Stable lowercase label used in logs and usage records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "native",
            Self::OpenAiCompat => "openai_compat",
            Self::Aggregator => "aggregator",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend server the gateway can dispatch to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendServer {
    /// Registry identifier, carried into usage records
    pub id: i64,
    /// Human-readable name for logs
    pub name: String,
    /// Base URL without a trailing slash requirement; dialect translators
    /// append their own paths
    pub base_url: String,
    /// Wire dialect this server speaks
    pub dialect: Dialect,
    /// Whether the server is currently eligible for dispatch
    pub active: bool,
    /// Opaque reference resolved through the credential store, if the server
    /// needs an API key
    pub credential_ref: Option<String>,
}

impl BackendServer {
    /// Base URL with any trailing slash removed.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

/// Capability flags and routing attributes for one catalog model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name as dispatched upstream
    pub model_name: String,
    /// Lower is preferred; feeds the auto-router's priority bonus
    pub priority: i32,
    /// Free-text capability description, scanned for partial-credit keywords
    pub description: Option<String>,
    pub supports_images: bool,
    pub supports_code: bool,
    pub supports_tool_calling: bool,
    pub supports_internet: bool,
    pub supports_thinking: bool,
    pub is_fast: bool,
}

impl ModelMetadata {
    /// New entry with no capabilities and a neutral priority.
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            priority: 10,
            description: None,
            supports_images: false,
            supports_code: false,
            supports_tool_calling: false,
            supports_internet: false,
            supports_thinking: false,
            is_fast: false,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_images(mut self) -> Self {
        self.supports_images = true;
        self
    }

    pub fn with_code(mut self) -> Self {
        self.supports_code = true;
        self
    }

    pub fn with_tool_calling(mut self) -> Self {
        self.supports_tool_calling = true;
        self
    }

    pub fn with_internet(mut self) -> Self {
        self.supports_internet = true;
        self
    }

    pub fn with_thinking(mut self) -> Self {
        self.supports_thinking = true;
        self
    }

    pub fn with_fast(mut self) -> Self {
        self.is_fast = true;
        self
    }
}

/// Optional enrichment fetched or cached out-of-band: context window size and
/// per-million-token pricing. Absent fields degrade scoring gracefully.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDetails {
    pub context_length: Option<u64>,
    pub prompt_price: Option<f64>,
    pub completion_price: Option<f64>,
}

/// One message frame inside a canonical stream chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub role: String,
    pub content: String,
}

/// One line of the canonical NDJSON stream.
///
/// Intermediate chunks carry a content delta with `done: false`; the single
/// final chunk carries `done: true` plus `eval_count`/`eval_duration`. A
/// mid-stream failure is reported in-band by setting `error`, which clients
/// must treat as request termination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalChunk {
    pub model: String,
    /// ISO-8601 UTC timestamp with a `Z` suffix
    pub created_at: String,
    pub message: CanonicalMessage,
    pub done: bool,
    /// Completion token estimate, final chunk only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    /// Wall-clock generation time in nanoseconds, final chunk only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_duration: Option<u64>,
    /// In-band failure report; terminates the request when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CanonicalChunk {
    /// Intermediate content delta.
    pub fn content(model: &str, content: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            created_at: utc_now_iso(),
            message: CanonicalMessage {
                role: "assistant".to_string(),
                content: content.into(),
            },
            done: false,
            eval_count: None,
            eval_duration: None,
            error: None,
        }
    }

    /// Terminal chunk carrying the generation statistics.
    pub fn done(model: &str, eval_count: u64, eval_duration: u64) -> Self {
        Self {
            model: model.to_string(),
            created_at: utc_now_iso(),
            message: CanonicalMessage {
                role: "assistant".to_string(),
                content: String::new(),
            },
            done: true,
            eval_count: Some(eval_count),
            eval_duration: Some(eval_duration),
            error: None,
        }
    }

    /// In-band error frame.
    pub fn error_frame(model: &str, error: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            created_at: utc_now_iso(),
            message: CanonicalMessage {
                role: "assistant".to_string(),
                content: String::new(),
            },
            done: false,
            eval_count: None,
            eval_duration: None,
            error: Some(error.into()),
        }
    }
}

/// Canonical non-streaming chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalResponse {
    pub id: String,
    /// Unix seconds
    pub created: i64,
    pub model: String,
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Current UTC time as ISO-8601 with microsecond precision and `Z` suffix.
pub fn utc_now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
