//! Classifies an `auto` task into one of the configured subagent types.
//!
//! Grounded in the original implementation's `route_task`/`TaskComplexity`
//! classifier, which picked a subagent type and fell back to `coder` on any
//! routing failure (no classifier configured, a malformed reply, a provider
//! error). This port keeps that fallback contract but drops the unused
//! complexity/task-type labels — nothing downstream of `task`/`parallel_tasks`
//! reads them, only the resolved subagent type matters.

use crate::config::known_types;
use codesm_core::Message;
use codesm_providers::ProviderRegistry;
use futures::StreamExt;

const ROUTER_MODEL_ALIAS: &str = "router";
const DEFAULT_ROUTE: &str = "coder";

fn router_prompt(task_types: &[&str], prompt: &str) -> String {
    format!(
        "Classify the following task into exactly one of these types: {}.\n\
         Reply with only the type name, nothing else.\n\nTask:\n{}",
        task_types.join(", "),
        prompt
    )
}

/// Resolves `auto` to a concrete subagent type. Any failure along the way
/// (no classifier provider configured, transport error, an unrecognized
/// reply) degrades to `coder` rather than failing the caller's task.
pub async fn route_task(providers: &ProviderRegistry, prompt: &str) -> &'static str {
    let types = known_types();

    let provider = match providers.resolve(ROUTER_MODEL_ALIAS) {
        Ok(provider) => provider,
        Err(err) => {
            tracing::warn!(error = %err, "auto-routing: no classifier provider configured, defaulting to coder");
            return DEFAULT_ROUTE;
        }
    };

    let question = router_prompt(&types, prompt);
    let messages = vec![Message::user(question)];

    let mut stream = match provider.stream("You are a terse task router.", &messages, None).await {
        Ok(stream) => stream,
        Err(err) => {
            tracing::warn!(error = %err, "auto-routing failed, defaulting to coder");
            return DEFAULT_ROUTE;
        }
    };

    let mut reply = String::new();
    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(codesm_core::StreamChunk::Text { text }) => reply.push_str(&text),
            Ok(_) => {}
            Err(err) => {
                tracing::warn!(error = %err, "auto-routing stream failed, defaulting to coder");
                return DEFAULT_ROUTE;
            }
        }
    }

    let picked = reply.trim().to_lowercase();
    types
        .into_iter()
        .find(|t| *t == picked)
        .unwrap_or(DEFAULT_ROUTE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_known_type() {
        let prompt = router_prompt(&["coder", "oracle"], "fix the bug");
        assert!(prompt.contains("coder, oracle"));
        assert!(prompt.contains("fix the bug"));
    }

    #[tokio::test]
    async fn no_configured_provider_falls_back_to_coder() {
        std::env::remove_var("CODESM_ROUTER_API_KEY");
        let providers = ProviderRegistry::new();
        let picked = route_task(&providers, "do something").await;
        assert_eq!(picked, "coder");
    }
}
