//! # modelgate
//!
//! Routing and protocol-translation core for a multi-dialect LLM gateway.
//!
//! One gateway fronts a fleet of heterogeneous model servers — native NDJSON
//! backends, OpenAI-compatible SSE backends, and third-party aggregators —
//! and presents them behind a single canonical protocol. The crate provides:
//!
//! - **Request analysis** ([`analyzer`]): capability requirements inferred
//!   from a request body.
//! - **Routing** ([`routing`]): weighted capability scoring, priority modes,
//!   and `auto` model selection with an exclusion set.
//! - **Translation** ([`translate`]): per-dialect request/response mapping
//!   and stream normalization, including thinking-token bracketing.
//! - **Dispatch** ([`gateway`]): candidate server selection, retry with a
//!   total deadline, server failover, and mid-selection model fallback for
//!   streaming `auto` requests.
//!
//! The serving layer (HTTP framework, persistence, authentication) stays
//! outside; it plugs in through the traits in [`gateway::registry`].

#![deny(unsafe_code)]

pub mod analyzer;
pub mod config;
pub mod error;
pub mod gateway;
pub mod retry;
pub mod routing;
pub mod translate;
pub mod types;

pub use analyzer::{extract_model, RequirementProfile};
pub use config::{build_http_client, GatewaySettings};
pub use error::GatewayError;
pub use gateway::{GatewayRouter, RequestContext};
pub use routing::PriorityMode;
pub use types::{
    BackendServer, CanonicalChunk, CanonicalResponse, Dialect, ModelDetails, ModelMetadata,
};
