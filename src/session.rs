//! Per-session tool-usage counts, consulted by the scoring coordinator's
//! exploration penalty. Not owned by the router core: callers construct
//! and pass one in per request.

use std::collections::HashMap;

/// Non-negative per-tool usage counts for the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    counts: HashMap<String, u64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: HashMap<String, u64>) -> Self {
        Self { counts }
    }

    pub fn count(&self, tool: &str) -> u64 {
        self.counts.get(tool).copied().unwrap_or(0)
    }

    pub fn record_use(&mut self, tool: &str) {
        *self.counts.entry(tool.to_string()).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_tool_counts_zero() {
        let s = SessionState::new();
        assert_eq!(s.count("anything"), 0);
    }

    #[test]
    fn record_use_increments() {
        let mut s = SessionState::new();
        s.record_use("find_symbol");
        s.record_use("find_symbol");
        assert_eq!(s.count("find_symbol"), 2);
    }
}
