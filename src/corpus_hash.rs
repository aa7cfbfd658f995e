//! Deterministic digest identifying a tool set plus embedding model identity.

use crate::tool::ToolSpec;

/// Hex-encoded 256-bit digest. `avoid_when` never contributes; everything
/// else that affects routing or embedding text does.
pub fn compute(specs: &[ToolSpec], embedding_model: &str) -> String {
    let mut sorted: Vec<&ToolSpec> = specs.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut hasher = blake3::Hasher::new();
    for spec in sorted {
        hasher.update(spec.name.as_bytes());
        hasher.update(b"\0");

        let mut best_for = spec.best_for.clone();
        best_for.sort();
        for phrase in &best_for {
            hasher.update(phrase.as_bytes());
            hasher.update(b"\0");
        }
        hasher.update(b"\0");

        hasher.update(spec.use_when.as_bytes());
        hasher.update(b"\0");
    }
    hasher.update(embedding_model.as_bytes());

    hasher.finalize().to_hex().to_string()
}

/// Persistent-store key for a given corpus hash, per the `"routing/emb/v1/"`
/// key-layout contract.
pub fn cache_key(hash: &str) -> String {
    format!("routing/emb/v1/{hash}")
}
