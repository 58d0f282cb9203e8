//! Deterministic token estimation. No tokenizer dependency: every provider
//! behind `codesm-providers` counts tokens differently, so this crate only
//! needs a cheap, consistent figure to decide when to compact.

use codesm_core::Message;

/// Rough estimate: ~4 characters per token, counted over message content only
/// (tool call arguments and attributes are not included).
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let total_chars: usize = messages.iter().map(|m| m.content.len()).sum();
    total_chars / 4
}

/// True once the estimated token count exceeds 80% of `max_tokens`.
pub fn should_compact(messages: &[Message], max_tokens: usize) -> bool {
    estimate_tokens(messages) as f64 > max_tokens as f64 * 0.8
}

#[cfg(test)]
mod tests {
    use super::*;
    use codesm_core::Message;

    #[test]
    fn estimates_four_chars_per_token() {
        let messages = vec![Message::user("a".repeat(400))];
        assert_eq!(estimate_tokens(&messages), 100);
    }

    #[test]
    fn compacts_once_past_eighty_percent_of_the_window() {
        let messages = vec![Message::user("a".repeat(400))];
        assert!(should_compact(&messages, 125));
        assert!(!should_compact(&messages, 1000));
    }
}
