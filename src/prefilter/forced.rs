//! Phase 1 of the pre-filter: forced mappings.

use regex::Regex;

use crate::config::ForcedMapping;
use crate::tool::ToolSet;

enum Matcher {
    Substring(String),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, query_lower: &str) -> bool {
        match self {
            Matcher::Substring(s) => query_lower.contains(s.as_str()),
            Matcher::Regex(re) => re.is_match(query_lower),
        }
    }

    fn compile(pattern: &str) -> Option<Self> {
        if pattern.contains(".*") {
            match Regex::new(&format!("(?i){pattern}")) {
                Ok(re) => Some(Matcher::Regex(re)),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "invalid regex in forced mapping, skipping pattern");
                    None
                }
            }
        } else {
            Some(Matcher::Substring(pattern.to_lowercase()))
        }
    }
}

/// Patterns are compiled once at pre-filter construction time.
pub struct CompiledMappings {
    entries: Vec<(String, String, Vec<Matcher>)>,
}

impl CompiledMappings {
    pub fn compile(mappings: &[ForcedMapping]) -> Self {
        let entries = mappings
            .iter()
            .map(|m| {
                let matchers = m.patterns.iter().filter_map(|p| Matcher::compile(p)).collect();
                (m.tool.clone(), m.reason.clone(), matchers)
            })
            .collect();
        Self { entries }
    }

    /// In list order, test each mapping's patterns. On first match, and if
    /// the tool exists in the supplied set, return a forced result.
    pub fn first_match(&self, query_lower: &str, specs: &ToolSet) -> Option<(String, String)> {
        for (tool, reason, matchers) in &self.entries {
            if matchers.iter().any(|m| m.matches(query_lower)) && specs.contains(tool) {
                return Some((tool.clone(), reason.clone()));
            }
        }
        None
    }
}
