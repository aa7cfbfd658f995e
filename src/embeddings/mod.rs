//! Per-tool embedding vectors: warm-up, persistence, and cosine scoring.
//!
//! `l2_normalize` and `dot_product` over an `RwLock`-guarded vector map,
//! brute-force cosine lookup, backed by an HTTP embedding-service client
//! and a corpus-hash-keyed persistent store.

pub mod client;

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::corpus_hash;
use crate::store::{CacheStore, DEFAULT_TTL};
use crate::tool::ToolSpec;

/// Maximum number of embedding calls to run concurrently during warm-up.
const WARMUP_FANOUT: usize = 10;
const QUERY_TIMEOUT: Duration = Duration::from_secs(3);

/// Abstraction over the embedding service: `embed(model, text) -> vector`.
/// Implementers may substitute any functionally equivalent transport.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, model: &str, text: &str) -> anyhow::Result<Vec<f32>>;
}

pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Read-only-after-warm-up cache of unit-normalized per-tool vectors.
///
/// Lifecycle: created unwarmed; [`EmbeddingCache::warm_up`] runs at most
/// once per instance (a one-shot latch guards this, tolerating concurrent
/// first callers); read-only thereafter via [`EmbeddingCache::score`].
pub struct EmbeddingCache {
    client: std::sync::Arc<dyn EmbeddingClient>,
    store: std::sync::Arc<dyn CacheStore>,
    model: String,
    warmup_timeout: Duration,
    vectors: RwLock<HashMap<String, Vec<f32>>>,
    warm_latch: OnceCell<()>,
}

impl EmbeddingCache {
    pub fn new(
        client: std::sync::Arc<dyn EmbeddingClient>,
        store: std::sync::Arc<dyn CacheStore>,
        model: String,
        warmup_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            model,
            warmup_timeout,
            vectors: RwLock::new(HashMap::new()),
            warm_latch: OnceCell::new(),
        }
    }

    /// True once at least one vector has been loaded, whether from the
    /// persistent store or the embedding service. The warm-up latch alone
    /// only tells you `warm_up` has been *called*; a total failure still
    /// leaves it initialized with an empty vector map.
    pub fn is_warmed(&self) -> bool {
        !self.vectors.read().expect("embedding vector lock poisoned").is_empty()
    }

    /// Runs the warm-up contract exactly once, regardless of how many
    /// concurrent callers invoke it.
    pub async fn warm_up(&self, specs: &[ToolSpec]) {
        self.warm_latch
            .get_or_init(|| self.warm_up_once(specs))
            .await;
    }

    async fn warm_up_once(&self, specs: &[ToolSpec]) {
        let start = std::time::Instant::now();
        let hash = corpus_hash::compute(specs, &self.model);
        let key = corpus_hash::cache_key(&hash);

        if let Some(loaded) = self.store.load(&key).await {
            info!(tools = loaded.len(), "embedding cache warmed from persistent store");
            *self.vectors.write().expect("embedding vector lock poisoned") = loaded;
            crate::metrics::global().record_latency("warmup.store", start.elapsed());
            return;
        }

        let fetch = async {
            let results: Vec<(String, Option<Vec<f32>>)> = stream::iter(specs.iter())
                .map(|spec| async move {
                    let text = spec.embedding_text();
                    match self.client.embed(&self.model, &text).await {
                        Ok(mut v) => {
                            l2_normalize(&mut v);
                            (spec.name.clone(), Some(v))
                        }
                        Err(e) => {
                            warn!(tool = %spec.name, error = %e, "embedding call failed during warm-up");
                            (spec.name.clone(), None)
                        }
                    }
                })
                .buffer_unordered(WARMUP_FANOUT)
                .collect()
                .await;
            results
        };

        let results = match tokio::time::timeout(self.warmup_timeout, fetch).await {
            Ok(r) => r,
            Err(_) => {
                warn!("embedding warm-up timed out; cache remains cold");
                crate::metrics::global().record_latency("warmup.timeout", start.elapsed());
                return;
            }
        };

        let map: HashMap<String, Vec<f32>> = results
            .into_iter()
            .filter_map(|(name, v)| v.map(|v| (name, v)))
            .collect();

        if map.is_empty() {
            warn!("every embedding call failed during warm-up; cache remains cold");
            crate::metrics::global().record_latency("warmup.failed", start.elapsed());
            return;
        }

        info!(tools = map.len(), total = specs.len(), "embedding cache warmed from service");
        *self.vectors.write().expect("embedding vector lock poisoned") = map.clone();
        crate::metrics::global().record_latency("warmup.service", start.elapsed());

        self.store.save(&key, &map, DEFAULT_TTL).await;
    }

    /// Scores a query by cosine similarity against every warmed vector.
    /// Returns the sentinel `None` ("no scores") if unwarmed, on embedding
    /// failure, or on timeout. Never an error.
    pub async fn score(&self, query: &str) -> Option<HashMap<String, f64>> {
        if !self.is_warmed() {
            return None;
        }

        let start = std::time::Instant::now();
        let mut query_vec = match tokio::time::timeout(
            QUERY_TIMEOUT,
            self.client.embed(&self.model, query),
        )
        .await
        {
            Ok(Ok(v)) => v,
            Ok(Err(e)) => {
                debug!(error = %e, "query embedding failed, returning sentinel");
                return None;
            }
            Err(_) => {
                debug!("query embedding timed out, returning sentinel");
                return None;
            }
        };
        crate::metrics::global().record_latency("embedding", start.elapsed());
        l2_normalize(&mut query_vec);

        let vectors = self.vectors.read().expect("embedding vector lock poisoned");
        let scores: HashMap<String, f64> = vectors
            .iter()
            .filter_map(|(name, v)| {
                let sim = dot_product(&query_vec, v) as f64;
                (sim > 0.0).then_some((name.clone(), sim))
            })
            .collect();

        Some(scores)
    }

    #[cfg(test)]
    pub(crate) fn vector_count(&self) -> usize {
        self.vectors.read().expect("embedding vector lock poisoned").len()
    }
}
