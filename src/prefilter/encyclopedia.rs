//! Phase 0 of the pre-filter: the routing encyclopedia.

use std::collections::HashMap;

use crate::config::{EncyclopediaEntry, EncyclopediaTier};
use crate::tool::ToolSet;

pub struct Phase0Result {
    pub forced: Option<(String, String)>,
    pub boosts: HashMap<String, f64>,
    pub hints: Vec<String>,
    pub applied_rules: Vec<String>,
}

/// For each entry, if no anti-signal matches and some intent pattern does,
/// act on its tier. `force` short-circuits the whole pipeline by returning
/// `forced` set; callers should stop processing further entries once that
/// happens, matching the "return immediately" wording in the pipeline spec.
pub fn apply(entries: &[EncyclopediaEntry], query_lower: &str, specs: &ToolSet) -> Phase0Result {
    let mut result = Phase0Result {
        forced: None,
        boosts: HashMap::new(),
        hints: Vec::new(),
        applied_rules: Vec::new(),
    };

    for entry in entries {
        let anti_signal_hit = entry
            .anti_signals
            .iter()
            .any(|s| query_lower.contains(s.to_lowercase().as_str()));
        if anti_signal_hit {
            continue;
        }

        let intent_hit = entry
            .intent_patterns
            .iter()
            .any(|p| query_lower.contains(p.to_lowercase().as_str()));
        if !intent_hit {
            continue;
        }

        match entry.tier {
            EncyclopediaTier::Force => {
                if specs.contains(&entry.tool) {
                    result.forced = Some((entry.tool.clone(), entry.reason.clone()));
                    result.applied_rules.push(format!("encyclopedia.force:{}", entry.tool));
                    return result;
                }
            }
            EncyclopediaTier::Boost => {
                *result.boosts.entry(entry.tool.clone()).or_insert(0.0) += entry.boost_amount;
                result.applied_rules.push(format!("encyclopedia.boost:{}", entry.tool));
            }
            EncyclopediaTier::Hint => {
                result.hints.push(entry.tool.clone());
                result.applied_rules.push(format!("encyclopedia.hint:{}", entry.tool));
            }
        }
    }

    result
}
