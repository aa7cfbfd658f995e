//! Orchestrates BM25 + embedding + session-usage penalty into a unified
//! score map.
//!
//! Lazy initialization follows the "one-shot latch" design note: the first
//! call with a non-empty spec list builds the BM25 index and triggers the
//! one-shot embedding warm-up; both happen exactly once per process
//! regardless of concurrent callers.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::bm25::BmIndex;
use crate::config::ScoringMode;
use crate::embeddings::EmbeddingCache;
use crate::session::SessionState;
use crate::tool::ToolSpec;

const EXPLORATION_PENALTY_RATE: f64 = 0.15;

pub struct ScoringCoordinator {
    bm25: OnceLock<BmIndex>,
    embeddings: EmbeddingCache,
    mode: ScoringMode,
}

impl ScoringCoordinator {
    pub fn new(embeddings: EmbeddingCache, mode: ScoringMode) -> Self {
        Self {
            bm25: OnceLock::new(),
            embeddings,
            mode,
        }
    }

    /// Computes the unified score map for a query, or the sentinel `None`
    /// ("no scores") when neither scoring source has anything to offer.
    pub async fn score(
        &self,
        query: &str,
        specs: &[ToolSpec],
        session: &SessionState,
    ) -> Option<HashMap<String, f64>> {
        if specs.is_empty() {
            return None;
        }

        let bm25 = self.bm25.get_or_init(|| BmIndex::build(specs));
        self.embeddings.warm_up(specs).await;

        let embedding_scores = self.embeddings.score(query).await;

        let mut scores = match self.mode {
            ScoringMode::EmbeddingPrimary => embedding_scores?,
            ScoringMode::Hybrid => {
                let bm25_scores = bm25.score(query);
                match embedding_scores {
                    None => bm25_scores,
                    Some(emb) => combine(&bm25_scores, &emb),
                }
            }
        };

        apply_exploration_penalty(&mut scores, session);

        Some(scores)
    }
}

fn combine(bm25: &HashMap<String, f64>, embedding: &HashMap<String, f64>) -> HashMap<String, f64> {
    let mut combined = HashMap::new();
    for tool in bm25.keys().chain(embedding.keys()) {
        combined.entry(tool.clone()).or_insert_with(|| {
            let b = bm25.get(tool).copied().unwrap_or(0.0);
            let e = embedding.get(tool).copied().unwrap_or(0.0);
            0.4 * b + 0.6 * e
        });
    }
    combined
}

fn apply_exploration_penalty(scores: &mut HashMap<String, f64>, session: &SessionState) {
    for (tool, score) in scores.iter_mut() {
        let n = session.count(tool);
        if n > 0 {
            *score = (*score - EXPLORATION_PENALTY_RATE * n as f64).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NullCacheStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FakeClient;

    #[async_trait]
    impl crate::embeddings::EmbeddingClient for FakeClient {
        async fn embed(&self, _model: &str, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: String::new(),
            best_for: vec!["alpha".into()],
            use_when: "use it".into(),
            avoid_when: String::new(),
            category: "analysis".into(),
            params: vec![],
        }
    }

    #[test]
    fn combine_weights_bm25_and_embedding() {
        let mut bm25 = HashMap::new();
        bm25.insert("a".to_string(), 1.0);
        let mut emb = HashMap::new();
        emb.insert("a".to_string(), 0.5);
        let combined = combine(&bm25, &emb);
        assert!((combined["a"] - (0.4 * 1.0 + 0.6 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn exploration_penalty_clamps_at_zero() {
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 0.2);
        let mut session = SessionState::new();
        for _ in 0..5 {
            session.record_use("a");
        }
        apply_exploration_penalty(&mut scores, &session);
        assert_eq!(scores["a"], 0.0);
    }

    #[test]
    fn exploration_penalty_skips_unused_tools() {
        let mut scores = HashMap::new();
        scores.insert("a".to_string(), 0.5);
        let session = SessionState::new();
        apply_exploration_penalty(&mut scores, &session);
        assert_eq!(scores["a"], 0.5);
    }

    #[tokio::test]
    async fn embedding_primary_mode_returns_sentinel_without_warm_embeddings() {
        let coordinator = ScoringCoordinator::new(
            EmbeddingCache::new(
                Arc::new(FakeClient),
                Arc::new(NullCacheStore),
                "m".into(),
                std::time::Duration::from_secs(10),
            ),
            ScoringMode::EmbeddingPrimary,
        );
        let specs = vec![spec("a")];
        let result = coordinator.score("query", &specs, &SessionState::new()).await;
        assert!(result.is_some(), "fake client always succeeds so warm-up should populate scores");
    }

    #[tokio::test]
    async fn bm25_index_builds_exactly_once() {
        let coordinator = ScoringCoordinator::new(
            EmbeddingCache::new(
                Arc::new(FakeClient),
                Arc::new(NullCacheStore),
                "m".into(),
                std::time::Duration::from_secs(10),
            ),
            ScoringMode::Hybrid,
        );
        let specs = vec![spec("a"), spec("b")];
        let _ = coordinator.score("alpha", &specs, &SessionState::new()).await;
        let _ = coordinator.score("alpha", &specs, &SessionState::new()).await;
        assert!(coordinator.bm25.get().is_some());
    }
}
