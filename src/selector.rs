//! Turns a score map (or the sentinel) into a final ranked candidate list.

use std::collections::HashMap;

use crate::config::PreFilterConfig;
use crate::tool::ToolSpec;

/// Pure function: sentinel/empty-map passthrough, sort, floor+backfill, gap
/// cutoff, cap, union with `always_include`, final backfill. The output
/// preserves the input spec list's original order.
pub fn select(
    scores: Option<&HashMap<String, f64>>,
    specs: &[ToolSpec],
    config: &PreFilterConfig,
) -> Vec<ToolSpec> {
    let Some(scores) = scores else {
        return specs.to_vec();
    };
    if scores.is_empty() {
        return specs.to_vec();
    }

    let mut by_score: Vec<&ToolSpec> = specs.iter().filter(|s| scores.contains_key(&s.name)).collect();
    by_score.sort_by(|a, b| {
        let sa = scores[&a.name];
        let sb = scores[&b.name];
        sb.partial_cmp(&sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });

    let min_candidates = config.min_candidates.min(specs.len());

    let mut above_floor: Vec<&ToolSpec> = by_score
        .iter()
        .filter(|s| scores[&s.name] >= config.score_floor)
        .copied()
        .collect();

    if above_floor.len() < min_candidates {
        for s in &by_score {
            if above_floor.iter().any(|x| x.name == s.name) {
                continue;
            }
            above_floor.push(s);
            if above_floor.len() >= min_candidates {
                break;
            }
        }
    }

    let mut narrowed: Vec<&ToolSpec> = above_floor;
    let mut cut_at = narrowed.len();
    for i in min_candidates..narrowed.len() {
        let gap = scores[&narrowed[i - 1].name] - scores[&narrowed[i].name];
        if gap > config.score_gap_threshold {
            cut_at = i;
            break;
        }
    }
    narrowed.truncate(cut_at);

    narrowed.truncate(config.max_candidates);

    let mut names: std::collections::HashSet<String> = narrowed.iter().map(|s| s.name.clone()).collect();
    for always in &config.always_include {
        if names.contains(always) {
            continue;
        }
        if let Some(spec) = specs.iter().find(|s| &s.name == always) {
            narrowed.push(spec);
            names.insert(always.clone());
        }
    }

    if narrowed.len() < min_candidates {
        for spec in specs {
            if names.contains(&spec.name) {
                continue;
            }
            narrowed.push(spec);
            names.insert(spec.name.clone());
            if narrowed.len() >= min_candidates {
                break;
            }
        }
    }

    let keep: std::collections::HashSet<&str> = narrowed.iter().map(|s| s.name.as_str()).collect();
    specs.iter().filter(|s| keep.contains(s.name.as_str())).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: String::new(),
            best_for: vec![],
            use_when: String::new(),
            avoid_when: String::new(),
            category: "analysis".into(),
            params: vec![],
        }
    }

    fn config() -> PreFilterConfig {
        PreFilterConfig {
            min_candidates: 2,
            max_candidates: 4,
            score_floor: 0.1,
            score_gap_threshold: 0.3,
            ..PreFilterConfig::default()
        }
    }

    #[test]
    fn sentinel_passes_through_all_specs() {
        let specs = vec![spec("a"), spec("b")];
        let result = select(None, &specs, &config());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn empty_map_passes_through_all_specs() {
        let specs = vec![spec("a"), spec("b")];
        let result = select(Some(&HashMap::new()), &specs, &config());
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn drops_below_floor_tools() {
        let specs = vec![spec("a"), spec("b"), spec("c")];
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 0.9);
        scores.insert("b".to_string(), 0.8);
        scores.insert("c".to_string(), 0.05);
        let result = select(Some(&scores), &specs, &config());
        assert!(result.iter().any(|s| s.name == "a"));
        assert!(result.iter().any(|s| s.name == "b"));
        assert!(!result.iter().any(|s| s.name == "c"));
    }

    #[test]
    fn backfills_to_min_candidates_when_floor_drops_too_many() {
        let specs = vec![spec("a"), spec("b"), spec("c")];
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 0.05);
        scores.insert("b".to_string(), 0.04);
        scores.insert("c".to_string(), 0.03);
        let result = select(Some(&scores), &specs, &config());
        assert!(result.len() >= 2);
    }

    #[test]
    fn gap_cutoff_trims_low_scoring_tail() {
        let specs = vec![spec("a"), spec("b"), spec("c"), spec("d")];
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 0.9);
        scores.insert("b".to_string(), 0.8);
        scores.insert("c".to_string(), 0.2);
        scores.insert("d".to_string(), 0.15);
        let result = select(Some(&scores), &specs, &config());
        assert!(result.iter().any(|s| s.name == "a"));
        assert!(result.iter().any(|s| s.name == "b"));
        assert!(!result.iter().any(|s| s.name == "c"));
        assert!(!result.iter().any(|s| s.name == "d"));
    }

    #[test]
    fn caps_to_max_candidates() {
        let specs: Vec<ToolSpec> = (0..10).map(|i| spec(&format!("t{i}"))).collect();
        let mut scores = HashMap::new();
        for (i, s) in specs.iter().enumerate() {
            scores.insert(s.name.clone(), 1.0 - (i as f64) * 0.01);
        }
        let result = select(Some(&scores), &specs, &config());
        assert!(result.len() <= config().max_candidates + config().always_include.len());
    }

    #[test]
    fn always_include_is_unioned_in() {
        let specs = vec![spec("a"), spec("b"), spec("always_tool")];
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 0.9);
        scores.insert("b".to_string(), 0.8);
        let mut cfg = config();
        cfg.always_include = vec!["always_tool".to_string()];
        let result = select(Some(&scores), &specs, &cfg);
        assert!(result.iter().any(|s| s.name == "always_tool"));
    }

    #[test]
    fn output_preserves_original_spec_order() {
        let specs = vec![spec("c"), spec("a"), spec("b")];
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 0.9);
        scores.insert("b".to_string(), 0.8);
        scores.insert("c".to_string(), 0.7);
        let result = select(Some(&scores), &specs, &config());
        let names: Vec<&str> = result.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
