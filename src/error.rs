use thiserror::Error;

/// Errors that can cross the router's public boundary.
///
/// Most internal failures (embedding service hiccups, store errors, escalation
/// timeouts) are absorbed and logged rather than returned; see the module docs
/// on [`crate::escalate`] and [`crate::scoring`]. Only the variants here are ever
/// constructed from a public entry point.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The primary classifier call itself failed. Surfaced as-is.
    #[error("primary classifier call failed: {0}")]
    PrimaryClassifier(#[from] anyhow::Error),

    /// The classifier's pick was not in the narrowed set, and was not found
    /// in the full tool set either. Non-retriable.
    #[error("classifier returned unknown tool '{tool}'")]
    HallucinatedTool { tool: String },

    /// The classifier's response could not be parsed as the expected JSON
    /// shape. Retriable.
    #[error("failed to parse classifier response: {0}")]
    ParseFailure(String),
}

impl RouterError {
    /// True for failures a caller may reasonably retry (e.g. resubmitting the
    /// same request), false for failures that will recur deterministically.
    pub fn is_retriable(&self) -> bool {
        matches!(self, RouterError::ParseFailure(_))
    }
}
