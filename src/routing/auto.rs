//! Auto-router: picks the best catalog model for a request.
//!
//! Pipeline: priority-mode filter → exclusion set → capability scoring →
//! priority bonus → deterministic ranking.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::analyzer::RequirementProfile;
use crate::routing::modes::{self, PriorityMode};
use crate::routing::scorer::{self, AxisWeights};
use crate::types::{ModelDetails, ModelMetadata};

/// Outcome of one auto-routing decision.
#[derive(Debug, Clone)]
pub struct Selection {
    pub metadata: ModelMetadata,
    /// Capability match score in `[0, 100]`
    pub match_score: f64,
    /// Match score plus the priority bonus; the ranking key
    pub final_score: f64,
}

/// Select the best model for `profile`, honoring the priority mode and
/// skipping anything in `excluded` (models already tried and failed).
///
/// Returns `None` when the catalog is empty or every candidate is excluded.
pub fn select_best_model(
    catalog: &[ModelMetadata],
    profile: &RequirementProfile,
    mode: PriorityMode,
    details: &HashMap<String, ModelDetails>,
    excluded: &HashSet<String>,
) -> Option<Selection> {
    if catalog.is_empty() {
        return None;
    }

    let weights = AxisWeights::default();
    let mut scored: Vec<Selection> = modes::filter_by_mode(catalog, mode, details)
        .into_iter()
        .filter(|m| !excluded.contains(&m.model_name))
        .map(|m| {
            let match_score =
                scorer::match_score(m, profile, details.get(&m.model_name), &weights);
            // Lower priority number means higher priority; priority 1 earns
            // the full 20-point bonus.
            let priority_bonus = (11 - m.priority) as f64 * 2.0;
            Selection {
                metadata: m.clone(),
                match_score,
                final_score: match_score + priority_bonus,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.metadata.priority.cmp(&b.metadata.priority))
            .then(a.metadata.model_name.cmp(&b.metadata.model_name))
    });

    let best = scored.first()?.clone();
    info!(
        model = %best.metadata.model_name,
        priority = best.metadata.priority,
        match_score = best.match_score,
        final_score = best.final_score,
        mode = %mode,
        "auto-router selected model"
    );
    for (i, s) in scored.iter().take(3).enumerate() {
        debug!(
            rank = i + 1,
            model = %s.metadata.model_name,
            match_score = s.match_score,
            final_score = s.final_score,
            "auto-router candidate"
        );
    }
    Some(best)
}
