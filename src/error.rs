//! Error Handling Module
//!
//! Gateway error taxonomy shared by routing, translation, and dispatch:
//! - `Configuration` — a candidate is unusable as configured (e.g. a dialect
//!   that requires a credential has none); fatal for that candidate only.
//! - `Http` — upstream returned a non-2xx status; carries status and body.
//! - `Connection` / `Timeout` — transport-level failures; the retryable class.
//! - `ModelNotFound` — derived from `Http` via pattern match; only meaningful
//!   during auto-routing, where it triggers model reselection.
//! - `Exhausted` — every candidate server (or every candidate model) failed.

use thiserror::Error;

/// Vocabulary that marks an upstream 4xx body as a model-level failure
/// rather than a server-level one.
const MODEL_NOT_FOUND_MARKERS: &[&str] = &["model", "not found", "no such", "endpoint"];

/// Unified error type for the gateway core
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Candidate-level configuration problem (missing credential, bad URL)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upstream returned a non-2xx HTTP response
    #[error("upstream HTTP {status}: {body}")]
    Http {
        /// HTTP status code reported by the upstream
        status: u16,
        /// Response body (possibly truncated) for diagnostics
        body: String,
    },

    /// Connection-level transport failure (refused, reset, DNS)
    #[error("connection error: {0}")]
    Connection(String),

    /// Request timed out at the transport level
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The upstream does not serve the requested model
    #[error("model '{model}' not available upstream: {detail}")]
    ModelNotFound {
        /// Model the request asked for
        model: String,
        /// Upstream error text that triggered the classification
        detail: String,
    },

    /// Every candidate server or model was tried and failed
    #[error("all candidates exhausted for '{subject}': {detail}")]
    Exhausted {
        /// Model name or request label the candidates were resolved for
        subject: String,
        /// Aggregated failure description
        detail: String,
    },

    /// A wire payload could not be parsed
    #[error("parse error: {0}")]
    Parse(String),

    /// A live stream failed mid-flight
    #[error("stream error: {0}")]
    Stream(String),

    /// Invariant violation inside the gateway itself
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Build an `Http` error, truncating oversized bodies.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > 2048 {
            let mut cut = 2048;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Self::Http { status, body }
    }

    /// Map a `reqwest` transport error onto the gateway taxonomy.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_connect() {
            Self::Connection(e.to_string())
        } else {
            Self::Connection(format!("transport error: {e}"))
        }
    }

    /// Whether the retry executor may retry this error.
    ///
    /// Only the transient transport class is retryable; a non-2xx response is
    /// never retried unless the caller installs its own retry condition.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout(_))
    }

    /// Whether this error means the upstream does not serve the model.
    ///
    /// True for `ModelNotFound`, and for `Http` errors with status 400 or 404
    /// whose body carries model-not-found vocabulary.
    pub fn is_model_not_found(&self) -> bool {
        match self {
            Self::ModelNotFound { .. } => true,
            Self::Http { status, body } if *status == 404 || *status == 400 => {
                let lower = body.to_lowercase();
                MODEL_NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m))
            }
            _ => false,
        }
    }
}

/// Classify a non-2xx upstream response for a specific model.
///
/// Status 400/404 with model-not-found vocabulary becomes `ModelNotFound`
/// (which auto-routing recovers from by reselecting); everything else stays a
/// plain `Http` error.
pub fn classify_upstream(model: &str, status: u16, body: &str) -> GatewayError {
    let base = GatewayError::http(status, body);
    if base.is_model_not_found() {
        GatewayError::ModelNotFound {
            model: model.to_string(),
            detail: format!("HTTP {status}: {body}"),
        }
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_body_truncation_respects_char_boundaries() {
        let body = format!("{}é tail", "a".repeat(2047));
        let GatewayError::Http { body, .. } = GatewayError::http(502, body) else {
            panic!("expected Http variant");
        };
        assert_eq!(body.len(), 2047);
        assert!(body.chars().all(|c| c == 'a'));

        let short = GatewayError::http(502, "small");
        assert!(matches!(short, GatewayError::Http { body, .. } if body == "small"));
    }

    #[test]
    fn transport_errors_are_retryable() {
        assert!(GatewayError::Connection("refused".into()).is_retryable());
        assert!(GatewayError::Timeout("deadline".into()).is_retryable());
        assert!(!GatewayError::http(500, "boom").is_retryable());
        assert!(!GatewayError::Parse("bad json".into()).is_retryable());
    }

    #[test]
    fn model_not_found_requires_status_and_vocabulary() {
        assert!(GatewayError::http(404, "model 'x' not found").is_model_not_found());
        assert!(GatewayError::http(400, "no such endpoint").is_model_not_found());
        // Right vocabulary, wrong status
        assert!(!GatewayError::http(500, "model not found").is_model_not_found());
        // Right status, no vocabulary
        assert!(!GatewayError::http(404, "route missing").is_model_not_found());
    }

    #[test]
    fn classify_upstream_derives_model_not_found() {
        let err = classify_upstream("llama3", 404, "model \"llama3\" not found");
        assert!(matches!(err, GatewayError::ModelNotFound { ref model, .. } if model == "llama3"));
        let err = classify_upstream("llama3", 503, "overloaded");
        assert!(matches!(err, GatewayError::Http { status: 503, .. }));
    }
}
