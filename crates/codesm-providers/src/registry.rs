//! Resolves a model identifier (an alias or a bare `<provider>/<model>`
//! string) to a constructed `Provider`, reading vendor API keys from the
//! environment.

use crate::anthropic::AnthropicProvider;
use crate::error::ProviderError;
use crate::openai::OpenAiProvider;
use crate::provider::Provider;
use crate::router::RouterProvider;
use codesm_core::{split_provider_model, ModelAliasTable};
use std::sync::Arc;

const DEFAULT_ROUTER_BASE_URL: &str = "https://api.openrouter.ai/api/v1/chat/completions";

pub struct ProviderRegistry {
    aliases: ModelAliasTable,
    router_base_url: String,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            aliases: ModelAliasTable::default(),
            router_base_url: DEFAULT_ROUTER_BASE_URL.to_string(),
        }
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_router_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.router_base_url = base_url.into();
        self
    }

    /// Resolves `identifier` (alias or `<provider>/<model>`) and constructs
    /// the matching adapter. API keys are read from the vendor's
    /// conventional environment variable.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        let resolved = self.aliases.resolve(identifier);
        let (provider, model) = split_provider_model(resolved);

        match provider {
            "anthropic" => {
                let key = require_env("ANTHROPIC_API_KEY")?;
                Ok(Arc::new(AnthropicProvider::new(key, model)))
            }
            "openai" => {
                let key = require_env("OPENAI_API_KEY")?;
                Ok(Arc::new(OpenAiProvider::new(key, model)))
            }
            "router" => {
                let key = require_env("CODESM_ROUTER_API_KEY")?;
                Ok(Arc::new(RouterProvider::new(self.router_base_url.clone(), key, model)))
            }
            other => Err(ProviderError::InvalidRequest(format!(
                "unknown provider '{other}' in model identifier '{identifier}'"
            ))),
        }
    }
}

fn require_env(name: &str) -> Result<String, ProviderError> {
    std::env::var(name).map_err(|_| ProviderError::Auth(format!("environment variable {name} is not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_prefix_is_rejected() {
        let registry = ProviderRegistry::new();
        let err = registry.resolve("mistral/large").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn missing_api_key_surfaces_as_auth_error() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let registry = ProviderRegistry::new();
        let err = registry.resolve("anthropic/claude-3-5-haiku-20241022").unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
    }
}
