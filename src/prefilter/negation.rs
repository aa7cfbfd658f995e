//! Phase 2 of the pre-filter: negation detection.

use crate::config::NegationRule;
use crate::tool::ToolSet;

/// Finds a forcing negation rule, if any fires for this query.
///
/// The query is split on whitespace into a positional token sequence, not
/// the usual tokenizer: negation proximity is measured in raw word
/// positions. Multi-word trigger keywords match contiguous subsequences.
pub fn find_forced(
    rules: &[NegationRule],
    query_lower: &str,
    proximity: usize,
    specs: &ToolSet,
) -> Option<(String, String)> {
    let tokens: Vec<&str> = query_lower.split_whitespace().collect();

    for rule in rules {
        if !specs.contains(&rule.correct_tool) {
            continue;
        }

        let neg_positions: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| rule.negation_words.iter().any(|w| w == *t))
            .map(|(i, _)| i)
            .collect();
        if neg_positions.is_empty() {
            continue;
        }

        let kw_positions = find_keyword_positions(&tokens, &rule.trigger_keywords);
        if kw_positions.is_empty() {
            continue;
        }

        let fires = neg_positions.iter().any(|&neg_pos| {
            kw_positions.iter().any(|&kw_pos| {
                kw_pos > neg_pos && kw_pos - neg_pos <= proximity
            })
        });

        if fires {
            return Some((rule.correct_tool.clone(), rule.reason.clone()));
        }
    }

    None
}

/// Returns the starting token index of every occurrence of any keyword
/// (which may itself be multiple words) as a contiguous subsequence of `tokens`.
fn find_keyword_positions(tokens: &[&str], keywords: &[String]) -> Vec<usize> {
    let mut positions = Vec::new();
    for keyword in keywords {
        let kw_tokens: Vec<&str> = keyword.split_whitespace().collect();
        if kw_tokens.is_empty() || kw_tokens.len() > tokens.len() {
            continue;
        }
        for start in 0..=(tokens.len() - kw_tokens.len()) {
            if tokens[start..start + kw_tokens.len()] == kw_tokens[..] {
                positions.push(start);
            }
        }
    }
    positions
}
