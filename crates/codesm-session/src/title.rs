//! Title generation: triggered by the session layer when the first user
//! message arrives and the title is still the default.

use async_trait::async_trait;

#[async_trait]
pub trait TitleProvider: Send + Sync {
    async fn generate(&self, first_user_message: &str) -> String;
}

/// Takes the first non-empty line, trimmed to a reasonable display length.
/// Used when no LLM-backed provider is configured, and as a fallback if one
/// fails.
pub struct HeuristicTitleProvider {
    pub max_len: usize,
}

impl Default for HeuristicTitleProvider {
    fn default() -> Self {
        Self { max_len: 60 }
    }
}

#[async_trait]
impl TitleProvider for HeuristicTitleProvider {
    async fn generate(&self, first_user_message: &str) -> String {
        let first_line = first_user_message
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or(first_user_message.trim());

        if first_line.chars().count() <= self.max_len {
            first_line.to_string()
        } else {
            let truncated: String = first_line.chars().take(self.max_len.saturating_sub(1)).collect();
            format!("{truncated}…")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn takes_first_non_empty_line() {
        let provider = HeuristicTitleProvider::default();
        let title = provider.generate("\n\nFix the login bug\nwith extra detail").await;
        assert_eq!(title, "Fix the login bug");
    }

    #[tokio::test]
    async fn truncates_long_lines() {
        let provider = HeuristicTitleProvider { max_len: 10 };
        let title = provider.generate("this is a very long first line indeed").await;
        assert_eq!(title.chars().count(), 10);
        assert!(title.ends_with('…'));
    }
}
