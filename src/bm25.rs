//! Okapi-BM25 scoring over a bag-of-tokens document model.
//!
//! Documents use binary term presence rather than true term frequency, and
//! `length` is vocabulary size rather than raw token count. See
//! `DESIGN.md` for why this reproduction was chosen over true TF.

use std::collections::HashMap;

use crate::tokenizer::tokenize;
use crate::tool::ToolSpec;

const K1: f64 = 1.5;
const B: f64 = 0.75;

struct Document {
    tool_name: String,
    /// Binary presence: every value is 1.0, keyed by token.
    terms: HashMap<String, f64>,
    length: f64,
}

/// An immutable BM25 index built once per distinct tool set. Safe to share
/// across threads and to score concurrently: nothing here is mutated after
/// [`BmIndex::build`] returns.
pub struct BmIndex {
    docs: Vec<Document>,
    idf: HashMap<String, f64>,
    avg_len: f64,
}

impl BmIndex {
    /// Builds one document per tool from `name + best_for + use_when`. An
    /// empty spec list yields an index that reports itself empty and always
    /// scores zero.
    pub fn build(specs: &[ToolSpec]) -> Self {
        let mut docs = Vec::with_capacity(specs.len());
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut total_len = 0.0;

        for spec in specs {
            let tokens = tokenize(&spec.scoring_text());
            let mut terms = HashMap::with_capacity(tokens.len());
            for t in &tokens {
                terms.insert(t.clone(), 1.0);
            }
            for t in terms.keys() {
                *df.entry(t.clone()).or_insert(0) += 1;
            }
            let length = terms.len() as f64;
            total_len += length;
            docs.push(Document {
                tool_name: spec.name.clone(),
                terms,
                length,
            });
        }

        let n = docs.len() as f64;
        let avg_len = if docs.is_empty() { 0.0 } else { total_len / n };

        // Lucene-style smoothed IDF: ln((N+1)/(df+1) + 1) + 1
        let idf = df
            .into_iter()
            .map(|(term, freq)| {
                let f = freq as f64;
                let idf = (((n + 1.0) / (f + 1.0)) + 1.0).ln() + 1.0;
                (term, idf)
            })
            .collect();

        Self { docs, idf, avg_len }
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Scores a query against every document, normalizing by the maximum so
    /// the top score is exactly 1. Tools scoring 0 are omitted. Returns an
    /// empty map for an empty query or an empty index.
    pub fn score(&self, query: &str) -> HashMap<String, f64> {
        if self.docs.is_empty() {
            return HashMap::new();
        }

        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return HashMap::new();
        }

        let start = std::time::Instant::now();
        let mut raw = HashMap::with_capacity(self.docs.len());
        for doc in &self.docs {
            let mut score = 0.0_f64;
            for qt in &query_terms {
                let Some(&idf) = self.idf.get(qt) else {
                    continue;
                };
                let Some(&tf) = doc.terms.get(qt) else {
                    continue;
                };
                let numerator = tf * (K1 + 1.0);
                let denominator = tf + K1 * (1.0 - B + B * (doc.length / self.avg_len));
                score += idf * (numerator / denominator);
            }
            if score > 0.0 {
                raw.insert(doc.tool_name.clone(), score);
            }
        }

        crate::metrics::global().record_latency("bm25", start.elapsed());

        let max = raw.values().cloned().fold(0.0_f64, f64::max);
        if max <= 0.0 {
            return HashMap::new();
        }

        raw.into_iter().map(|(name, s)| (name, s / max)).collect()
    }
}
