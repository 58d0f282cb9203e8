//! Short-name → full model-identifier alias table, shared by providers and
//! subagent task routing. Model identifiers are `<provider>/<model>`.

use std::collections::HashMap;

/// Resolves alias names (`smart`, `rush`, `oracle`, ...) used by subagent
/// configs and CLI flags to a concrete `<provider>/<model>` identifier.
#[derive(Debug, Clone)]
pub struct ModelAliasTable {
    aliases: HashMap<String, String>,
}

impl Default for ModelAliasTable {
    fn default() -> Self {
        let mut aliases = HashMap::new();
        aliases.insert("smart".into(), "anthropic/claude-sonnet-4-20250514".into());
        aliases.insert("rush".into(), "anthropic/claude-3-5-haiku-20241022".into());
        aliases.insert("oracle".into(), "openai/gpt-4o".into());
        aliases.insert("finder".into(), "anthropic/claude-3-5-haiku-20241022".into());
        aliases.insert("review".into(), "anthropic/claude-sonnet-4-20250514".into());
        aliases.insert("diagram".into(), "anthropic/claude-sonnet-4-20250514".into());
        aliases.insert("handoff".into(), "anthropic/claude-3-5-haiku-20241022".into());
        aliases.insert("topics".into(), "router/anthropic/claude-3-haiku-20240307".into());
        aliases.insert("router".into(), "router/anthropic/claude-3-haiku-20240307".into());
        Self { aliases }
    }
}

impl ModelAliasTable {
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn insert(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }
}

/// Splits a `<provider>/<model>` identifier. Returns the whole string as the
/// model with an empty provider when no `/` is present.
pub fn split_provider_model(identifier: &str) -> (&str, &str) {
    match identifier.split_once('/') {
        Some((provider, model)) => (provider, model),
        None => ("", identifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_alias() {
        let table = ModelAliasTable::default();
        assert_eq!(table.resolve("smart"), "anthropic/claude-sonnet-4-20250514");
    }

    #[test]
    fn passes_through_unknown_alias() {
        let table = ModelAliasTable::default();
        assert_eq!(table.resolve("anthropic/claude-opus-4"), "anthropic/claude-opus-4");
    }

    #[test]
    fn splits_provider_and_model() {
        assert_eq!(split_provider_model("anthropic/claude-3"), ("anthropic", "claude-3"));
        assert_eq!(split_provider_model("bare"), ("", "bare"));
    }
}
