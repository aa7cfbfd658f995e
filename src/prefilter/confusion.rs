//! Phase 4 of the pre-filter: confusion-pair resolution.

use std::collections::HashMap;

use crate::config::ConfusionPair;

/// For each pair, compute whether each side's patterns matched the query.
/// If exactly one side matched, add `boost_amount` (already scaled by the
/// caller) to that tool's score. If both or neither matched, do nothing.
pub fn apply(pairs: &[ConfusionPair], query_lower: &str, scale: f64, scores: &mut HashMap<String, f64>) {
    for pair in pairs {
        let a_matched = pair.a_patterns.iter().any(|p| query_lower.contains(p.to_lowercase().as_str()));
        let b_matched = pair.b_patterns.iter().any(|p| query_lower.contains(p.to_lowercase().as_str()));

        if a_matched == b_matched {
            continue;
        }

        let boosted_tool = if a_matched { &pair.tool_a } else { &pair.tool_b };
        *scores.entry(boosted_tool.clone()).or_insert(0.0) += pair.boost_amount * scale;
    }
}
