//! A hybrid BM25 + embedding tool-routing pre-filter and selector for a
//! code-analysis assistant. See [`router::Router`] for the top-level entry
//! point.

pub mod bm25;
pub mod classifier;
pub mod config;
pub mod corpus_hash;
pub mod embeddings;
pub mod error;
pub mod escalate;
pub mod metrics;
pub mod prefilter;
pub mod router;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod store;
pub mod tokenizer;
pub mod tool;

pub use error::RouterError;
pub use router::{RouteDecision, Router};
pub use tool::{ToolSet, ToolSpec};

/// Initializes the global `tracing` subscriber from a level string (e.g.
/// `"info"`, `"debug"`), writing to stderr. Safe to call once at process
/// startup; a second call is a no-op.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
