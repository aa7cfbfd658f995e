//! Top-level facade wiring the pre-filter, scoring coordinator, and
//! escalating selector into one `route` call.
//!
//! One constructor assembles every collaborator once, and the resulting
//! struct is the single entry point callers hold onto.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument};

use crate::classifier::{ChatClient, ToolSelection};
use crate::config::RouterConfig;
use crate::embeddings::client::ReqwestEmbeddingClient;
use crate::embeddings::EmbeddingCache;
use crate::error::RouterError;
use crate::escalate::EscalatingSelector;
use crate::prefilter::{PreFilter, PreFilterResult};
use crate::scoring::ScoringCoordinator;
use crate::session::SessionState;
use crate::store::{CacheStore, NullCacheStore};
use crate::tool::ToolSet;

/// The outcome of routing a single query: either a pre-filter short-circuit
/// (no classifier call made at all) or a classifier-backed selection.
#[derive(Debug, Clone)]
pub enum RouteDecision {
    Forced { tool: String, reason: String },
    Selected(ToolSelection),
}

impl RouteDecision {
    pub fn tool_name(&self) -> &str {
        match self {
            RouteDecision::Forced { tool, .. } => tool,
            RouteDecision::Selected(selection) => &selection.tool,
        }
    }
}

pub struct Router {
    tools: ToolSet,
    prefilter: PreFilter,
    scoring: ScoringCoordinator,
    selector: EscalatingSelector,
}

impl Router {
    /// Assembles every collaborator from a loaded [`RouterConfig`], a live
    /// tool registry, a primary classifier, and an optional escalation
    /// classifier. Uses an HTTP embedding client and, if `cache_store` is
    /// omitted, disables persistence via [`NullCacheStore`].
    pub fn new(
        config: RouterConfig,
        tools: ToolSet,
        primary: Arc<dyn ChatClient>,
        escalation: Option<Arc<dyn ChatClient>>,
        cache_store: Option<Arc<dyn CacheStore>>,
    ) -> anyhow::Result<Self> {
        let embedding_client = Arc::new(ReqwestEmbeddingClient::new(
            config.embedding.service_url.clone(),
            config.embedding.query_timeout,
        )?);
        let store = cache_store.unwrap_or_else(|| Arc::new(NullCacheStore));
        let embeddings = EmbeddingCache::new(
            embedding_client,
            store,
            config.embedding.model.clone(),
            config.embedding.warmup_timeout,
        );
        let scoring = ScoringCoordinator::new(embeddings, config.prefilter.scoring_mode);
        let prefilter = PreFilter::new(config.prefilter.clone());
        let selector = EscalatingSelector::new(primary, escalation)
            .with_confidence_threshold(config.escalation.confidence_threshold)
            .with_escalation_timeout(config.escalation.escalation_timeout);

        Ok(Self { tools, prefilter, scoring, selector })
    }

    /// Assembles a `Router` from already-constructed collaborators, bypassing
    /// the HTTP embedding client `Router::new` builds. Useful for tests and
    /// for hosts that want to supply their own [`ScoringCoordinator`] (e.g.
    /// wired to a non-HTTP embedding transport).
    pub fn from_parts(
        tools: ToolSet,
        prefilter: PreFilter,
        scoring: ScoringCoordinator,
        selector: EscalatingSelector,
    ) -> Self {
        Self { tools, prefilter, scoring, selector }
    }

    /// Runs the full pipeline: pre-filter narrows the candidate set (and may
    /// short-circuit with a forced tool), then the narrowed set is handed to
    /// the escalating selector for a classifier-backed pick.
    #[instrument(skip(self, session))]
    pub async fn route(&self, query: &str, session: &SessionState) -> Result<RouteDecision, RouterError> {
        let start = Instant::now();
        let prefilter_result = self.prefilter.run(query, &self.tools, &self.scoring, session).await;

        if let Some(tool) = prefilter_result.forced_tool.clone() {
            let reason = prefilter_result.forced_reason.clone().unwrap_or_default();
            info!(tool = %tool, elapsed_ms = start.elapsed().as_millis() as u64, "route resolved via pre-filter force");
            crate::metrics::global().incr("route.outcome.forced");
            return Ok(RouteDecision::Forced { tool, reason });
        }

        let selection = self
            .selector
            .select(query, &prefilter_result.narrowed_specs, &self.tools)
            .await?;

        info!(
            tool = %selection.tool,
            confidence = selection.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "route resolved via classifier selection"
        );
        crate::metrics::global().incr("route.outcome.selected");
        Ok(RouteDecision::Selected(selection))
    }

    /// Runs only the deterministic pre-filter phase, without any classifier
    /// call. Useful for diagnostics and the corpus-hash/cache-warming paths.
    pub async fn pre_filter_only(&self, query: &str, session: &SessionState) -> PreFilterResult {
        self.prefilter.run(query, &self.tools, &self.scoring, session).await
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }
}
