//! Capability match scoring.
//!
//! Scores one catalog model against a [`RequirementProfile`] on a 0-100
//! scale. Every capability axis the request requires contributes its weight
//! to the applicable maximum; the raw score is then normalized against that
//! maximum, so a request that needs little is not dominated by axes it never
//! asked about.

use crate::analyzer::RequirementProfile;
use crate::types::{ModelDetails, ModelMetadata};

/// Score returned when the request requires nothing at all.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Fraction of an axis weight granted when the capability flag is absent but
/// the model description carries matching vocabulary.
const PARTIAL_CREDIT: f64 = 0.7;

/// Fraction of an axis weight deducted when a required capability is missing
/// and the description offers no evidence either.
const MISSING_PENALTY: f64 = 0.5;

/// Flat bonus for satisfying two or more required axes.
const VERSATILITY_BONUS: f64 = 5.0;

/// Per-axis importance weights.
#[derive(Debug, Clone, Copy)]
pub struct AxisWeights {
    pub images: f64,
    pub code: f64,
    pub tool_calling: f64,
    pub internet: f64,
    pub thinking: f64,
    pub fast: f64,
}

impl Default for AxisWeights {
    fn default() -> Self {
        Self {
            images: 10.0,
            code: 8.0,
            tool_calling: 9.0,
            internet: 10.0,
            thinking: 7.0,
            fast: 5.0,
        }
    }
}

/// Description vocabulary granting partial credit per axis.
const IMAGE_KEYWORDS: &[&str] = &["vision", "image", "multimodal", "visual", "photo", "picture"];
const CODE_KEYWORDS: &[&str] = &["code", "programming", "coder", "developer", "syntax", "algorithm"];
const TOOL_KEYWORDS: &[&str] = &["tool", "function", "plugin", "api", "integration"];
const INTERNET_KEYWORDS: &[&str] = &["web search", "internet", "grounding", "real-time", "live data"];
const THINKING_KEYWORDS: &[&str] = &["reasoning", "think", "reason", "step-by-step", "chain-of-thought"];
const FAST_KEYWORDS: &[&str] = &["fast", "turbo", "quick", "speed", "low latency", "efficient"];

/// Score `metadata` against `profile`, returning a value in `[0, 100]`.
pub fn match_score(
    metadata: &ModelMetadata,
    profile: &RequirementProfile,
    details: Option<&ModelDetails>,
    weights: &AxisWeights,
) -> f64 {
    let desc = metadata
        .description
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();

    let axes: [(bool, bool, f64, &[&str]); 6] = [
        (profile.has_images, metadata.supports_images, weights.images, IMAGE_KEYWORDS),
        (profile.contains_code, metadata.supports_code, weights.code, CODE_KEYWORDS),
        (
            profile.requires_tool_calling,
            metadata.supports_tool_calling,
            weights.tool_calling,
            TOOL_KEYWORDS,
        ),
        (
            profile.requires_internet,
            metadata.supports_internet,
            weights.internet,
            INTERNET_KEYWORDS,
        ),
        (
            profile.requires_thinking,
            metadata.supports_thinking,
            weights.thinking,
            THINKING_KEYWORDS,
        ),
        (profile.requires_fast, metadata.is_fast, weights.fast, FAST_KEYWORDS),
    ];

    let mut score = 0.0;
    let mut max_possible = 0.0;
    let mut satisfied = 0usize;

    for (required, supported, weight, keywords) in axes {
        if !required {
            continue;
        }
        max_possible += weight;
        if supported {
            score += weight;
            satisfied += 1;
        } else if keywords.iter().any(|kw| desc.contains(kw)) {
            score += weight * PARTIAL_CREDIT;
        } else {
            score -= weight * MISSING_PENALTY;
        }
    }

    // Long conversations prefer large context windows.
    if profile.prompt_length > 10_000 || profile.message_count > 20 {
        max_possible += 5.0;
        let context = details.and_then(|d| d.context_length).unwrap_or(0);
        score += if context >= 200_000 {
            5.0
        } else if context >= 100_000 {
            3.0
        } else if context >= 50_000 {
            1.0
        } else {
            0.0
        };
    }

    if profile.required_axes() >= 2 {
        max_possible += VERSATILITY_BONUS;
        if satisfied >= 2 {
            score += VERSATILITY_BONUS;
        }
    }

    if max_possible <= 0.0 {
        return NEUTRAL_SCORE;
    }
    (score / max_possible * 100.0).clamp(0.0, 100.0)
}
