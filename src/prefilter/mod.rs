//! The five-phase deterministic pre-filter pipeline (C6).

mod confusion;
mod encyclopedia;
mod forced;
mod negation;

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};

use crate::config::{PreFilterConfig, ScoringMode};
use crate::scoring::ScoringCoordinator;
use crate::selector;
use crate::session::SessionState;
use crate::tool::{ToolSet, ToolSpec};

/// The full result of one pre-filter invocation, carrying an audit trail of
/// every rule that fired.
#[derive(Debug, Clone)]
pub struct PreFilterResult {
    pub forced_tool: Option<String>,
    pub forced_reason: Option<String>,
    pub narrowed_specs: Vec<ToolSpec>,
    pub scores: HashMap<String, f64>,
    pub applied_rules: Vec<String>,
    pub original_count: usize,
    pub narrowed_count: usize,
    pub duration: Duration,
}

impl PreFilterResult {
    fn passthrough(specs: &ToolSet, duration: Duration) -> Self {
        let specs = specs.specs().to_vec();
        let narrowed_count = specs.len();
        Self {
            forced_tool: None,
            forced_reason: None,
            narrowed_specs: specs,
            scores: HashMap::new(),
            applied_rules: Vec::new(),
            original_count: narrowed_count,
            narrowed_count,
            duration,
        }
    }

    fn forced(
        tool: String,
        reason: String,
        specs: &ToolSet,
        applied_rules: Vec<String>,
        duration: Duration,
    ) -> Self {
        Self {
            forced_tool: Some(tool),
            forced_reason: Some(reason),
            narrowed_specs: Vec::new(),
            scores: HashMap::new(),
            applied_rules,
            original_count: specs.len(),
            narrowed_count: 0,
            duration,
        }
    }
}

/// Compiled once from [`PreFilterConfig`] and reused across requests.
/// Regex patterns in forced mappings are compiled exactly once, at
/// construction time.
pub struct PreFilter {
    config: PreFilterConfig,
    forced_mappings: forced::CompiledMappings,
}

impl PreFilter {
    pub fn new(config: PreFilterConfig) -> Self {
        let forced_mappings = forced::CompiledMappings::compile(&config.forced_mappings);
        Self { config, forced_mappings }
    }

    #[instrument(skip(self, coordinator, session), fields(query_len = query.len()))]
    pub async fn run(
        &self,
        query: &str,
        specs: &ToolSet,
        coordinator: &ScoringCoordinator,
        session: &SessionState,
    ) -> PreFilterResult {
        let start = Instant::now();

        if !self.config.enabled || query.trim().is_empty() || specs.is_empty() {
            return PreFilterResult::passthrough(specs, ensure_positive(start.elapsed()));
        }

        let query_lower = query.to_lowercase();
        let mut applied_rules = Vec::new();

        let phase0 = encyclopedia::apply(&self.config.routing_encyclopedia, &query_lower, specs);
        applied_rules.extend(phase0.applied_rules.clone());
        if let Some((tool, reason)) = phase0.forced {
            info!(tool = %tool, "encyclopedia forced tool selection");
            crate::metrics::global().incr("prefilter.forced.encyclopedia");
            return PreFilterResult::forced(tool, reason, specs, applied_rules, ensure_positive(start.elapsed()));
        }

        if let Some((tool, reason)) = self.forced_mappings.first_match(&query_lower, specs) {
            applied_rules.push(format!("forced_mapping:{tool}"));
            info!(tool = %tool, "forced mapping selected tool");
            crate::metrics::global().incr("prefilter.forced.mapping");
            return PreFilterResult::forced(tool, reason, specs, applied_rules, ensure_positive(start.elapsed()));
        }

        if let Some((tool, reason)) = negation::find_forced(
            &self.config.negation_rules,
            &query_lower,
            self.config.negation_proximity,
            specs,
        ) {
            applied_rules.push(format!("negation:{tool}"));
            info!(tool = %tool, "negation rule selected tool");
            crate::metrics::global().incr("prefilter.forced.negation");
            return PreFilterResult::forced(tool, reason, specs, applied_rules, ensure_positive(start.elapsed()));
        }

        let mut scores = coordinator.score(query, specs.specs(), session).await;
        debug!(has_scores = scores.is_some(), "hybrid scoring complete");

        let boost_scale = if matches!(self.config.scoring_mode, ScoringMode::EmbeddingPrimary) {
            0.1
        } else {
            1.0
        };

        if let Some(map) = scores.as_mut() {
            for (tool, boost) in &phase0.boosts {
                *map.entry(tool.clone()).or_insert(0.0) += boost * boost_scale;
            }
            if !phase0.boosts.is_empty() {
                applied_rules.push("encyclopedia_boosts_applied".to_string());
            }
            confusion::apply(&self.config.confusion_pairs, &query_lower, boost_scale, map);
        }

        let mut narrowed = selector::select(scores.as_ref(), specs.specs(), &self.config);

        for hint in &phase0.hints {
            if narrowed.iter().any(|s| &s.name == hint) {
                continue;
            }
            if let Some(spec) = specs.get(hint) {
                narrowed.push(spec.clone());
                applied_rules.push(format!("hint:{hint}"));
            }
        }

        crate::metrics::global().incr("prefilter.narrowed");
        let narrowed_count = narrowed.len();

        PreFilterResult {
            forced_tool: None,
            forced_reason: None,
            narrowed_specs: narrowed,
            scores: scores.unwrap_or_default(),
            applied_rules,
            original_count: specs.len(),
            narrowed_count,
            duration: ensure_positive(start.elapsed()),
        }
    }
}

/// `Instant::elapsed()` can read as zero on a sufficiently fast clock; the
/// duration-positivity invariant is guaranteed explicitly rather than left
/// to clock resolution.
fn ensure_positive(duration: Duration) -> Duration {
    if duration.is_zero() {
        Duration::from_nanos(1)
    } else {
        duration
    }
}
