//! Configuration for the pre-filter, scoring coordinator, embedding cache,
//! and escalating selector.
//!
//! YAML deserialization via `serde_yaml_ng`, `${VAR}`-style environment
//! interpolation applied to the raw text before parsing, a
//! humantime-flavored duration serde helper, and a `validate()` pass that
//! `anyhow::bail!`s on misconfiguration.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}
fn default_min_candidates() -> usize {
    3
}
fn default_max_candidates() -> usize {
    8
}
fn default_score_floor() -> f64 {
    0.1
}
fn default_score_gap_threshold() -> f64 {
    0.15
}
fn default_negation_proximity() -> usize {
    3
}
fn default_confidence_threshold() -> f64 {
    0.7
}
fn default_escalation_timeout() -> Duration {
    Duration::from_secs(3)
}
fn default_warmup_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_query_timeout() -> Duration {
    Duration::from_secs(3)
}
fn default_cache_ttl() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}
fn default_scoring_mode() -> ScoringMode {
    ScoringMode::EmbeddingPrimary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    EmbeddingPrimary,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncyclopediaTier {
    Force,
    Boost,
    Hint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcedMapping {
    pub patterns: Vec<String>,
    pub tool: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegationRule {
    pub negation_words: Vec<String>,
    pub trigger_keywords: Vec<String>,
    pub correct_tool: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionPair {
    pub tool_a: String,
    pub tool_b: String,
    pub a_patterns: Vec<String>,
    pub b_patterns: Vec<String>,
    pub boost_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncyclopediaEntry {
    pub tool: String,
    pub tier: EncyclopediaTier,
    pub intent_patterns: Vec<String>,
    #[serde(default)]
    pub anti_signals: Vec<String>,
    #[serde(default)]
    pub boost_amount: f64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreFilterConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_min_candidates")]
    pub min_candidates: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    #[serde(default = "default_score_floor")]
    pub score_floor: f64,
    #[serde(default = "default_score_gap_threshold")]
    pub score_gap_threshold: f64,
    #[serde(default = "default_negation_proximity")]
    pub negation_proximity: usize,
    #[serde(default)]
    pub always_include: Vec<String>,
    #[serde(default)]
    pub forced_mappings: Vec<ForcedMapping>,
    #[serde(default)]
    pub negation_rules: Vec<NegationRule>,
    #[serde(default)]
    pub confusion_pairs: Vec<ConfusionPair>,
    #[serde(default)]
    pub routing_encyclopedia: Vec<EncyclopediaEntry>,
    #[serde(default = "default_scoring_mode")]
    pub scoring_mode: ScoringMode,
}

impl Default for PreFilterConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            min_candidates: default_min_candidates(),
            max_candidates: default_max_candidates(),
            score_floor: default_score_floor(),
            score_gap_threshold: default_score_gap_threshold(),
            negation_proximity: default_negation_proximity(),
            always_include: Vec::new(),
            forced_mappings: Vec::new(),
            negation_rules: Vec::new(),
            confusion_pairs: Vec::new(),
            routing_encyclopedia: Vec::new(),
            scoring_mode: default_scoring_mode(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub service_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(with = "humantime_duration", default = "default_warmup_timeout")]
    pub warmup_timeout: Duration,
    #[serde(with = "humantime_duration", default = "default_query_timeout")]
    pub query_timeout: Duration,
    #[serde(with = "humantime_duration", default = "default_cache_ttl")]
    pub cache_ttl: Duration,
}

fn default_model() -> String {
    "text-embedding-router-v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    #[serde(with = "humantime_duration", default = "default_escalation_timeout")]
    pub escalation_timeout: Duration,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            escalation_timeout: default_escalation_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default)]
    pub prefilter: PreFilterConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub escalation: EscalationConfig,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RouterConfig {
    /// Reads a YAML file, expands `${VAR}` environment references, parses,
    /// and validates.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let expanded = expand_env_vars(&raw);
        let config: RouterConfig = serde_yaml_ng::from_str(&expanded)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.prefilter.min_candidates > self.prefilter.max_candidates {
            bail!(
                "prefilter.min_candidates ({}) must not exceed max_candidates ({})",
                self.prefilter.min_candidates,
                self.prefilter.max_candidates
            );
        }
        if !(0.0..=1.0).contains(&self.prefilter.score_floor) {
            bail!("prefilter.score_floor must be within [0, 1], got {}", self.prefilter.score_floor);
        }
        if !(0.0..=1.0).contains(&self.escalation.confidence_threshold) {
            bail!(
                "escalation.confidence_threshold must be within [0, 1], got {}",
                self.escalation.confidence_threshold
            );
        }
        if self.embedding.service_url.trim().is_empty() {
            bail!("embedding.service_url must not be empty");
        }

        for mapping in &self.prefilter.forced_mappings {
            for pattern in &mapping.patterns {
                if pattern.contains(".*") {
                    if let Err(e) = Regex::new(&format!("(?i){pattern}")) {
                        tracing::warn!(
                            tool = %mapping.tool,
                            pattern = %pattern,
                            error = %e,
                            "invalid regex in forced mapping at config load, pattern will be skipped"
                        );
                    }
                }
            }
        }

        Ok(())
    }
}

/// Replaces `${VAR}` tokens with the corresponding environment variable,
/// leaving the token untouched if the variable is unset.
fn expand_env_vars(input: &str) -> String {
    static VAR_PATTERN: std::sync::LazyLock<Regex> =
        std::sync::LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

    VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let name = &caps[1];
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// A humantime-flavored duration serde helper: `"500ms"`, `"3s"`, `"7d"`.
mod humantime_duration {
    use super::*;
    use serde::{Deserializer, Serializer, de::Error as _};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let secs = duration.as_secs_f64();
        let formatted = if secs >= 1.0 {
            format!("{secs}s")
        } else {
            format!("{}ms", duration.as_millis())
        };
        serializer.serialize_str(&formatted)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(D::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
        let s = s.trim();
        let (num_part, unit) = if let Some(n) = s.strip_suffix("ms") {
            (n, "ms")
        } else if let Some(n) = s.strip_suffix('s') {
            (n, "s")
        } else if let Some(n) = s.strip_suffix('m') {
            (n, "m")
        } else if let Some(n) = s.strip_suffix('h') {
            (n, "h")
        } else if let Some(n) = s.strip_suffix('d') {
            (n, "d")
        } else {
            return Err(format!("duration '{s}' missing a unit suffix (ms/s/m/h/d)"));
        };

        let value: f64 = num_part
            .parse()
            .map_err(|_| format!("duration '{s}' has a non-numeric value"))?;

        let secs = match unit {
            "ms" => value / 1000.0,
            "s" => value,
            "m" => value * 60.0,
            "h" => value * 3600.0,
            "d" => value * 86400.0,
            _ => unreachable!(),
        };

        Ok(Duration::from_secs_f64(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
embedding:
  service_url: "http://localhost:9000/embed"
"#
    }

    #[test]
    fn defaults_apply_when_sections_are_absent() {
        let config: RouterConfig = serde_yaml_ng::from_str(minimal_yaml()).unwrap();
        assert_eq!(config.prefilter.min_candidates, 3);
        assert_eq!(config.prefilter.max_candidates, 8);
        assert_eq!(config.prefilter.scoring_mode, ScoringMode::EmbeddingPrimary);
        assert_eq!(config.escalation.confidence_threshold, 0.7);
        assert_eq!(config.embedding.cache_ttl, Duration::from_secs(7 * 24 * 60 * 60));
    }

    #[test]
    fn validate_rejects_inverted_candidate_bounds() {
        let mut config: RouterConfig = serde_yaml_ng::from_str(minimal_yaml()).unwrap();
        config.prefilter.min_candidates = 10;
        config.prefilter.max_candidates = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_score_floor() {
        let mut config: RouterConfig = serde_yaml_ng::from_str(minimal_yaml()).unwrap();
        config.prefilter.score_floor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_warns_but_accepts_invalid_regex_forced_mapping() {
        // Matches forced.rs::Matcher::compile: an invalid regex pattern is
        // logged and skipped at the pre-filter level, not a fatal config error.
        let mut config: RouterConfig = serde_yaml_ng::from_str(minimal_yaml()).unwrap();
        config.prefilter.forced_mappings.push(ForcedMapping {
            patterns: vec!["path from .* to [".to_string()],
            tool: "find_path".to_string(),
            reason: String::new(),
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_var_expansion_substitutes_present_vars() {
        // SAFETY: test-local env var, no concurrent readers of this key in this process.
        unsafe { std::env::set_var("ROUTER_TEST_URL", "http://example.test/embed") };
        let yaml = "embedding:\n  service_url: \"${ROUTER_TEST_URL}\"\n";
        let expanded = expand_env_vars(yaml);
        assert!(expanded.contains("http://example.test/embed"));
        unsafe { std::env::remove_var("ROUTER_TEST_URL") };
    }

    #[test]
    fn env_var_expansion_leaves_unset_vars_untouched() {
        let expanded = expand_env_vars("${DEFINITELY_NOT_SET_XYZ}");
        assert_eq!(expanded, "${DEFINITELY_NOT_SET_XYZ}");
    }

    #[test]
    fn duration_parsing_round_trips_common_suffixes() {
        assert_eq!(humantime_duration::parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(humantime_duration::parse_duration("3s").unwrap(), Duration::from_secs(3));
        assert_eq!(humantime_duration::parse_duration("7d").unwrap(), Duration::from_secs(7 * 86400));
    }
}
