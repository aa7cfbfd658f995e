//! Process-global observability counters and latency histograms.
//!
//! A `DashMap` of named counters plus a `DashMap` of per-name
//! `hdrhistogram::Histogram` guarded by a `Mutex`, since the histogram
//! itself isn't `Sync`.

use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use hdrhistogram::Histogram;

pub struct RouterMetrics {
    counters: DashMap<String, u64>,
    latencies: DashMap<&'static str, Mutex<Histogram<u64>>>,
}

impl RouterMetrics {
    fn new() -> Self {
        Self {
            counters: DashMap::new(),
            latencies: DashMap::new(),
        }
    }

    /// Increments a named counter, e.g. `"prefilter.forced.negation"` or
    /// `"escalation.outcome.timeout_fallback"`.
    pub fn incr(&self, name: impl Into<String>) {
        *self.counters.entry(name.into()).or_insert(0) += 1;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }

    /// Records a latency sample against a well-known histogram name, e.g.
    /// `"bm25"`, `"embedding"`, `"escalation"`, or one of the warm-up
    /// sources `"warmup.store"`/`"warmup.service"`/`"warmup.timeout"`/
    /// `"warmup.failed"`.
    pub fn record_latency(&self, name: &'static str, duration: Duration) {
        let entry = self
            .latencies
            .entry(name)
            .or_insert_with(|| Mutex::new(Histogram::new(3).expect("valid histogram precision")));
        let mut hist = entry.lock().expect("metrics histogram lock poisoned");
        let _ = hist.record(duration.as_micros().min(u64::MAX as u128) as u64);
    }

    /// p50/p95/p99 in microseconds for a named histogram, if any samples exist.
    pub fn percentiles(&self, name: &str) -> Option<(u64, u64, u64)> {
        let entry = self.latencies.get(name)?;
        let hist = entry.lock().expect("metrics histogram lock poisoned");
        if hist.len() == 0 {
            return None;
        }
        Some((
            hist.value_at_quantile(0.5),
            hist.value_at_quantile(0.95),
            hist.value_at_quantile(0.99),
        ))
    }
}

static GLOBAL: OnceLock<RouterMetrics> = OnceLock::new();

/// The process-wide metrics instance. Counters and histograms aggregate
/// across requests by design, so this is the one piece of module-scope
/// global state the router keeps.
pub fn global() -> &'static RouterMetrics {
    GLOBAL.get_or_init(RouterMetrics::new)
}
