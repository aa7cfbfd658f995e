use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::RouterError;

/// An immutable description of one routable tool.
///
/// `avoid_when` is carried for documentation purposes only; it is never
/// included in any scoring document (negative framing degrades embeddings).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub best_for: Vec<String>,
    pub use_when: String,
    pub avoid_when: String,
    pub category: String,
    pub params: Vec<String>,
}

impl ToolSpec {
    /// Text fed into the BM25 document builder and the embedding client:
    /// `name + best_for + use_when`, deliberately excluding `avoid_when`.
    pub fn scoring_text(&self) -> String {
        format!("{} {} {}", self.name, self.best_for.join(" "), self.use_when)
    }

    /// Text fed to the embedding service: `name ∥ "." ∥ best_for.join(".") ∥ "." ∥ use_when`.
    pub fn embedding_text(&self) -> String {
        format!("{}.{}.{}", self.name, self.best_for.join("."), self.use_when)
    }
}

/// A registry of tool specs with a uniqueness invariant on `name`.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    specs: Vec<ToolSpec>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    pub fn new(specs: Vec<ToolSpec>) -> Result<Self, RouterError> {
        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(RouterError::ParseFailure(format!(
                    "duplicate tool name in registry: {}",
                    spec.name
                )));
            }
        }
        Ok(Self { specs, index })
    }

    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.specs[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: String::new(),
            best_for: vec!["alpha".into(), "beta".into()],
            use_when: "use it".into(),
            avoid_when: "never".into(),
            category: "analysis".into(),
            params: vec![],
        }
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = ToolSet::new(vec![spec("a"), spec("a")]).unwrap_err();
        assert!(matches!(err, RouterError::ParseFailure(_)));
    }

    #[test]
    fn scoring_text_excludes_avoid_when() {
        let s = spec("find_symbol");
        assert!(!s.scoring_text().contains("never"));
        assert!(s.scoring_text().contains("find_symbol"));
    }

    #[test]
    fn lookup_by_name() {
        let set = ToolSet::new(vec![spec("a"), spec("b")]).unwrap();
        assert!(set.contains("a"));
        assert!(!set.contains("c"));
        assert_eq!(set.get("b").unwrap().name, "b");
    }
}
