use std::collections::HashSet;
use std::sync::LazyLock;

/// Small stop-word list, kept short deliberately. This is a keyword router,
/// not a general IR system, so over-aggressive stopping would drop
/// discriminating terms.
static STOPWORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "a", "an", "of", "is", "to", "in", "and", "or", "are", "was",
        "were", "be", "been", "being", "have", "has", "had", "do", "does",
        "did", "will", "would", "could", "should", "can", "for", "on", "with",
        "at", "by", "from", "as", "it", "its", "this", "that", "these",
        "those", "all", "me", "my", "we", "our",
    ]
    .into_iter()
    .collect()
});

/// Lowercase, split on delimiters and case/digit transitions, drop
/// stop-words and purely numeric tokens, deduplicate.
///
/// Used identically to build BM25 documents and to tokenize incoming
/// queries. The two call sites must see the exact same splitting rules or
/// term matching silently breaks.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for span in lowered.split(|c: char| c.is_whitespace() || c == '.' || c == '_' || c == '-') {
        for word in split_case_and_digit_transitions(span) {
            if word.is_empty() || word.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if STOPWORDS.contains(word.as_str()) {
                continue;
            }
            if seen.insert(word.clone()) {
                out.push(word);
            }
        }
    }

    out
}

/// Splits at lowercase→uppercase and letter→digit/digit→letter boundaries,
/// e.g. `parseConfig2` → ["parse", "Config2"] → lowercased by the caller.
fn split_case_and_digit_transitions(span: &str) -> Vec<String> {
    let chars: Vec<char> = span.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut words = Vec::new();
    let mut current = String::new();

    for i in 0..chars.len() {
        if i > 0 && should_split(chars[i - 1], chars[i]) {
            words.push(std::mem::take(&mut current));
        }
        current.push(chars[i]);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .into_iter()
        .map(|w| w.to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn should_split(prev: char, next: char) -> bool {
    (prev.is_lowercase() && next.is_uppercase())
        || (prev.is_alphabetic() && next.is_ascii_digit())
        || (prev.is_ascii_digit() && next.is_alphabetic())
}
