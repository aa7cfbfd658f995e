//! Abstract chat-classifier contract and response parsing.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::RouterError;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub temperature: f64,
    pub max_tokens: u32,
    pub num_ctx: u32,
    pub model: String,
    pub keep_alive: String,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 256,
            num_ctx: 4096,
            model: String::new(),
            keep_alive: "5m".to_string(),
        }
    }
}

/// An abstract client accepting a list of messages plus options and
/// returning a text completion. Implementations are external
/// collaborators; this crate ships only a test double ([`FakeChatClient`]).
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> anyhow::Result<String>;
}

#[derive(Debug, Deserialize)]
pub struct ClassifierResponse {
    pub tool: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

/// `tool` (chosen name), `confidence`, `raw_model_pick` (the classifier's
/// unmodified first choice), `prefilter_miss` (the model's pick wasn't in
/// the narrowed candidate set).
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSelection {
    pub tool: String,
    pub confidence: f64,
    pub raw_model_pick: String,
    pub prefilter_miss: bool,
}

/// Parses a strict `{"tool": string, "confidence": number, "reasoning": string}`
/// object, tolerating surrounding prose and fenced code blocks.
pub fn parse_response(text: &str) -> Result<ClassifierResponse, RouterError> {
    let candidate = extract_json_object(text)
        .ok_or_else(|| RouterError::ParseFailure(format!("no JSON object found in: {text}")))?;

    serde_json::from_str(&candidate)
        .map_err(|e| RouterError::ParseFailure(format!("invalid classifier JSON: {e}")))
}

fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(text[start..=end].to_string())
}

/// A scripted test double implementing [`ChatClient`], used by this crate's
/// own tests and available to integration tests that exercise the
/// escalating selector end to end.
pub struct FakeChatClient {
    responses: std::sync::Mutex<std::collections::VecDeque<String>>,
    calls: std::sync::atomic::AtomicUsize,
}

impl FakeChatClient {
    /// Returns each response in order on successive `chat` calls.
    pub fn scripted(responses: Vec<String>) -> Self {
        Self {
            responses: std::sync::Mutex::new(responses.into_iter().collect()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    async fn chat(&self, _messages: &[ChatMessage], _options: &ChatOptions) -> anyhow::Result<String> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.responses
            .lock()
            .expect("fake chat client lock poisoned")
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("fake chat client ran out of scripted responses"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let resp = parse_response(r#"{"tool": "find_symbol", "confidence": 0.9, "reasoning": "ok"}"#).unwrap();
        assert_eq!(resp.tool, "find_symbol");
        assert_eq!(resp.confidence, 0.9);
    }

    #[test]
    fn tolerates_fenced_code_block() {
        let text = "Here is my answer:\n```json\n{\"tool\": \"find_symbol\", \"confidence\": 0.8}\n```\nThanks";
        let resp = parse_response(text).unwrap();
        assert_eq!(resp.tool, "find_symbol");
    }

    #[test]
    fn tolerates_surrounding_prose() {
        let text = "I think the answer is {\"tool\": \"find_path\", \"confidence\": 0.7} based on the query.";
        let resp = parse_response(text).unwrap();
        assert_eq!(resp.tool, "find_path");
    }

    #[test]
    fn missing_json_is_a_parse_failure() {
        let err = parse_response("no json here at all").unwrap_err();
        assert!(matches!(err, RouterError::ParseFailure(_)));
        assert!(err.is_retriable());
    }

    #[test]
    fn malformed_json_is_a_parse_failure() {
        let err = parse_response("{\"tool\": \"x\", \"confidence\": }").unwrap_err();
        assert!(matches!(err, RouterError::ParseFailure(_)));
    }
}
