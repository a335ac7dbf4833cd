//! Priority modes and catalog tier predicates.
//!
//! A priority mode narrows which catalog models the auto-router may consider.
//! Tier predicates lean on pricing when details are available, with name
//! patterns as the fallback signal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{ModelDetails, ModelMetadata};

/// Name suffix marking a model as free regardless of pricing data.
const FREE_NAME_MARKER: &str = ":free";
/// Name suffix marking an always-on hosted tier.
const ALWAYS_ON_MARKER: &str = ":cloud";

const TOP_TIER_PATTERNS: &[&str] = &[
    "claude-4.5",
    "claude-4",
    "gpt-5",
    "gpt-5.1",
    "gemini-3",
    "gemini-3-pro",
    "o4",
    "o4-mini",
    "o4-mini-high",
];

const MID_TIER_PATTERNS: &[&str] = &[
    "claude-opus",
    "claude-sonnet",
    "gpt-4",
    "gpt-4.1",
    "gemini-2.5-pro",
    "gemini-2.5-flash",
];

/// Name fallback for the luxury band when pricing is unavailable.
const LUXURY_NAME_PATTERNS: &[&str] = &["opus", "claude-opus", "gpt-4"];

/// Mid-tier price band, USD per 1M prompt tokens.
const MID_TIER_PRICE: (f64, f64) = (1.0, 6.0);
/// Luxury price band, USD per 1M prompt tokens.
const LUXURY_PRICE: (f64, f64) = (6.0, 15.0);

/// Cost posture for auto-routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityMode {
    /// Zero-cost models only
    Free,
    /// Always-on hosted models first, then free models
    DailyDrive,
    /// Paid top-tier and mid-tier models, free excluded
    Advanced,
    /// Premium price band only
    Luxury,
}

impl PriorityMode {
    /// Parse a mode label case-insensitively; unrecognized labels fall back
    /// to `Free` with a warning.
    pub fn parse(label: &str) -> Self {
        match label.to_lowercase().as_str() {
            "free" => Self::Free,
            "daily_drive" => Self::DailyDrive,
            "advanced" => Self::Advanced,
            "luxury" => Self::Luxury,
            other => {
                warn!(mode = other, "unknown priority mode, defaulting to free");
                Self::Free
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::DailyDrive => "daily_drive",
            Self::Advanced => "advanced",
            Self::Luxury => "luxury",
        }
    }
}

impl std::fmt::Display for PriorityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn prompt_price(name: &str, details: &HashMap<String, ModelDetails>) -> Option<f64> {
    details.get(name).and_then(|d| d.prompt_price)
}

/// Whether both prompt and completion pricing are zero, or the name carries
/// the `:free` marker.
pub fn is_free_model(metadata: &ModelMetadata, details: &HashMap<String, ModelDetails>) -> bool {
    if metadata.model_name.to_lowercase().contains(FREE_NAME_MARKER) {
        return true;
    }
    if let Some(d) = details.get(&metadata.model_name) {
        if let (Some(prompt), Some(completion)) = (d.prompt_price, d.completion_price) {
            return prompt == 0.0 && completion == 0.0;
        }
    }
    false
}

/// Whether the model belongs to an always-on hosted tier.
pub fn is_always_on_model(model_name: &str) -> bool {
    model_name.ends_with(ALWAYS_ON_MARKER)
}

/// Whether the name matches a flagship-generation pattern.
pub fn is_top_tier_model(model_name: &str) -> bool {
    let lower = model_name.to_lowercase();
    TOP_TIER_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Mid-tier: priced inside the mid band, or matching a mid-tier name pattern.
pub fn is_mid_tier_model(model_name: &str, details: &HashMap<String, ModelDetails>) -> bool {
    if let Some(price) = prompt_price(model_name, details) {
        if price >= MID_TIER_PRICE.0 && price <= MID_TIER_PRICE.1 {
            return true;
        }
    }
    let lower = model_name.to_lowercase();
    MID_TIER_PATTERNS.iter().any(|p| lower.contains(p))
}

fn is_luxury_model(metadata: &ModelMetadata, details: &HashMap<String, ModelDetails>) -> bool {
    match prompt_price(&metadata.model_name, details) {
        Some(price) => price >= LUXURY_PRICE.0 && price <= LUXURY_PRICE.1,
        None => {
            let lower = metadata.model_name.to_lowercase();
            LUXURY_NAME_PATTERNS.iter().any(|p| lower.contains(p))
        }
    }
}

/// Narrow a catalog to the models a priority mode permits.
///
/// An empty result falls back to the full catalog with a warning, so routing
/// is never left with nothing to choose from.
pub fn filter_by_mode<'a>(
    catalog: &'a [ModelMetadata],
    mode: PriorityMode,
    details: &HashMap<String, ModelDetails>,
) -> Vec<&'a ModelMetadata> {
    let filtered: Vec<&ModelMetadata> = match mode {
        PriorityMode::Free => catalog
            .iter()
            .filter(|m| is_free_model(m, details))
            .collect(),
        PriorityMode::DailyDrive => {
            let mut picked: Vec<&ModelMetadata> = catalog
                .iter()
                .filter(|m| is_always_on_model(&m.model_name))
                .collect();
            picked.extend(catalog.iter().filter(|m| {
                !is_always_on_model(&m.model_name) && is_free_model(m, details)
            }));
            picked
        }
        PriorityMode::Advanced => catalog
            .iter()
            .filter(|m| {
                (is_top_tier_model(&m.model_name) || is_mid_tier_model(&m.model_name, details))
                    && !is_free_model(m, details)
            })
            .collect(),
        PriorityMode::Luxury => catalog
            .iter()
            .filter(|m| !is_free_model(m, details) && is_luxury_model(m, details))
            .collect(),
    };

    if filtered.is_empty() && !catalog.is_empty() {
        warn!(mode = %mode, "no models match priority mode, falling back to full catalog");
        return catalog.iter().collect();
    }
    filtered
}
