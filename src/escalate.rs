//! Two-tier model dispatch: a fast primary classifier, escalating to a
//! larger classifier with the full tool set on low confidence or an
//! out-of-candidate pick.
//!
//! Confidence-threshold-gated dispatch with graceful fallback, using the
//! same `tokio::time::timeout`-wrapped retry idiom as the embedding client.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use crate::classifier::{ChatClient, ChatMessage, ChatOptions, ToolSelection, parse_response};
use crate::error::RouterError;
use crate::tool::{ToolSet, ToolSpec};

const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;
const HALLUCINATION_DIRECT_ACCEPT_CONFIDENCE: f64 = 0.85;

pub struct EscalatingSelector {
    primary: Arc<dyn ChatClient>,
    escalation: Option<Arc<dyn ChatClient>>,
    confidence_threshold: f64,
    escalation_timeout: Duration,
}

impl EscalatingSelector {
    pub fn new(primary: Arc<dyn ChatClient>, escalation: Option<Arc<dyn ChatClient>>) -> Self {
        Self {
            primary,
            escalation,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            escalation_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_escalation_timeout(mut self, timeout: Duration) -> Self {
        self.escalation_timeout = timeout;
        self
    }

    #[instrument(skip(self, narrowed, full_set))]
    pub async fn select(
        &self,
        query: &str,
        narrowed: &[ToolSpec],
        full_set: &ToolSet,
    ) -> Result<ToolSelection, RouterError> {
        let messages = build_messages(query, narrowed);
        let raw = self
            .primary
            .chat(&messages, &ChatOptions::default())
            .await
            .map_err(RouterError::PrimaryClassifier)?;
        let parsed = parse_response(&raw)?;

        let in_narrowed = narrowed.iter().any(|s| s.name == parsed.tool);
        let primary_pick = ToolSelection {
            tool: parsed.tool.clone(),
            confidence: parsed.confidence,
            raw_model_pick: parsed.tool.clone(),
            prefilter_miss: !in_narrowed,
        };

        if !in_narrowed {
            if !full_set.contains(&parsed.tool) {
                warn!(tool = %parsed.tool, "primary classifier hallucinated a tool name");
                crate::metrics::global().incr("prefilter_miss.hallucinated");
                return Err(RouterError::HallucinatedTool { tool: parsed.tool });
            }

            if parsed.confidence >= HALLUCINATION_DIRECT_ACCEPT_CONFIDENCE {
                info!(tool = %parsed.tool, confidence = parsed.confidence, "prefilter miss accepted directly");
                crate::metrics::global().incr("prefilter_miss.direct_accept");
                return Ok(primary_pick);
            }

            if self.escalation.is_none() {
                crate::metrics::global().incr("prefilter_miss.best_effort");
                return Ok(primary_pick);
            }

            return Ok(self.escalate(query, full_set, primary_pick).await);
        }

        if parsed.confidence >= self.confidence_threshold || self.escalation.is_none() {
            crate::metrics::global().incr("escalation.outcome.accepted");
            return Ok(primary_pick);
        }

        Ok(self.escalate(query, full_set, primary_pick).await)
    }

    async fn escalate(&self, query: &str, full_set: &ToolSet, primary_pick: ToolSelection) -> ToolSelection {
        let Some(escalation) = &self.escalation else {
            return primary_pick;
        };

        let messages = build_messages(query, full_set.specs());
        let start = std::time::Instant::now();
        let result = tokio::time::timeout(
            self.escalation_timeout,
            escalation.chat(&messages, &ChatOptions::default()),
        )
        .await;
        crate::metrics::global().record_latency("escalation", start.elapsed());

        match result {
            Ok(Ok(raw)) => match parse_response(&raw) {
                Ok(parsed) => {
                    info!(tool = %parsed.tool, "escalation succeeded");
                    crate::metrics::global().incr("escalation.outcome.success");
                    ToolSelection {
                        tool: parsed.tool.clone(),
                        confidence: parsed.confidence,
                        raw_model_pick: parsed.tool,
                        prefilter_miss: primary_pick.prefilter_miss,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "escalation response failed to parse, falling back to primary pick");
                    crate::metrics::global().incr("escalation.outcome.parse_fail_fallback");
                    primary_pick
                }
            },
            Ok(Err(e)) => {
                warn!(error = %e, "escalation call failed, falling back to primary pick");
                crate::metrics::global().incr("escalation.outcome.fail_fallback");
                primary_pick
            }
            Err(_) => {
                warn!("escalation call timed out, falling back to primary pick");
                crate::metrics::global().incr("escalation.outcome.timeout_fallback");
                primary_pick
            }
        }
    }
}

fn build_messages(query: &str, candidates: &[ToolSpec]) -> Vec<ChatMessage> {
    let tool_list = candidates
        .iter()
        .map(|s| format!("- {}: {}", s.name, s.description))
        .collect::<Vec<_>>()
        .join("\n");

    vec![
        ChatMessage::system(format!(
            "Choose the single best tool for the query from this list:\n{tool_list}\n\
             Respond with a JSON object: {{\"tool\": string, \"confidence\": number, \"reasoning\": string}}"
        )),
        ChatMessage::user(query),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::FakeChatClient;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: format!("{name} description"),
            best_for: vec![],
            use_when: String::new(),
            avoid_when: String::new(),
            category: "analysis".into(),
            params: vec![],
        }
    }

    fn full_set() -> ToolSet {
        ToolSet::new((0..55).map(|i| spec(&format!("tool_{i}"))).chain([spec("find_callers"), spec("find_implementations")]).collect()).unwrap()
    }

    #[tokio::test]
    async fn accepts_primary_pick_above_threshold() {
        let primary = Arc::new(FakeChatClient::scripted(vec![
            r#"{"tool": "find_callers", "confidence": 0.9}"#.to_string(),
        ]));
        let selector = EscalatingSelector::new(primary, None);
        let narrowed = vec![spec("find_callers")];
        let selection = selector.select("who calls this", &narrowed, &full_set()).await.unwrap();
        assert_eq!(selection.tool, "find_callers");
        assert!(!selection.prefilter_miss);
    }

    #[tokio::test]
    async fn escalates_on_low_confidence_scenario() {
        let primary = Arc::new(FakeChatClient::scripted(vec![
            r#"{"tool": "find_callers", "confidence": 0.4}"#.to_string(),
        ]));
        let escalation = Arc::new(FakeChatClient::scripted(vec![
            r#"{"tool": "find_implementations", "confidence": 0.85}"#.to_string(),
        ]));
        let selector = EscalatingSelector::new(primary, Some(escalation.clone()));
        let narrowed = vec![spec("find_callers")];
        let selection = selector.select("query", &narrowed, &full_set()).await.unwrap();
        assert_eq!(selection.tool, "find_implementations");
        assert_eq!(escalation.call_count(), 1);
    }

    #[tokio::test]
    async fn escalation_timeout_falls_back_to_primary() {
        struct SlowClient;
        #[async_trait::async_trait]
        impl ChatClient for SlowClient {
            async fn chat(&self, _m: &[ChatMessage], _o: &ChatOptions) -> anyhow::Result<String> {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(r#"{"tool": "never_gets_here", "confidence": 0.9}"#.to_string())
            }
        }

        let primary = Arc::new(FakeChatClient::scripted(vec![
            r#"{"tool": "find_callers", "confidence": 0.4}"#.to_string(),
        ]));
        let selector = EscalatingSelector::new(primary, Some(Arc::new(SlowClient)))
            .with_escalation_timeout(Duration::from_millis(50));
        let narrowed = vec![spec("find_callers")];

        let start = std::time::Instant::now();
        let selection = selector.select("query", &narrowed, &full_set()).await.unwrap();
        assert!(start.elapsed() <= Duration::from_secs(1));
        assert_eq!(selection.tool, "find_callers");
    }

    #[tokio::test]
    async fn hallucinated_tool_is_a_non_retriable_error() {
        let primary = Arc::new(FakeChatClient::scripted(vec![
            r#"{"tool": "nonexistent_magic_tool", "confidence": 0.95}"#.to_string(),
        ]));
        let selector = EscalatingSelector::new(primary, None);
        let narrowed = vec![spec("find_callers")];
        let err = selector.select("query", &narrowed, &full_set()).await.unwrap_err();
        assert!(matches!(err, RouterError::HallucinatedTool { .. }));
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn prefilter_miss_with_high_confidence_accepted_directly() {
        let primary = Arc::new(FakeChatClient::scripted(vec![
            r#"{"tool": "find_implementations", "confidence": 0.9}"#.to_string(),
        ]));
        let selector = EscalatingSelector::new(primary, None);
        let narrowed = vec![spec("find_callers")];
        let selection = selector.select("query", &narrowed, &full_set()).await.unwrap();
        assert_eq!(selection.tool, "find_implementations");
        assert!(selection.prefilter_miss);
    }

    #[tokio::test]
    async fn prefilter_miss_low_confidence_no_escalation_is_best_effort() {
        let primary = Arc::new(FakeChatClient::scripted(vec![
            r#"{"tool": "find_implementations", "confidence": 0.5}"#.to_string(),
        ]));
        let selector = EscalatingSelector::new(primary, None);
        let narrowed = vec![spec("find_callers")];
        let selection = selector.select("query", &narrowed, &full_set()).await.unwrap();
        assert_eq!(selection.tool, "find_implementations");
    }

    #[tokio::test]
    async fn primary_failure_propagates_error() {
        struct FailingClient;
        #[async_trait::async_trait]
        impl ChatClient for FailingClient {
            async fn chat(&self, _m: &[ChatMessage], _o: &ChatOptions) -> anyhow::Result<String> {
                anyhow::bail!("primary classifier is down")
            }
        }
        let selector = EscalatingSelector::new(Arc::new(FailingClient), None);
        let narrowed = vec![spec("find_callers")];
        let err = selector.select("query", &narrowed, &full_set()).await.unwrap_err();
        assert!(matches!(err, RouterError::PrimaryClassifier(_)));
    }
}
