//! Per-type subagent configuration: system prompt, model alias, and the
//! allowed-tool subset the parent registry is narrowed to before the
//! subagent's own orchestrator loop runs.

/// `None` means "every tool the parent registry exposes"; `task` and
/// `parallel_tasks` are always stripped regardless, so a subagent can never
/// spawn further subagents.
pub struct SubagentConfig {
    pub name: &'static str,
    pub system_prompt: &'static str,
    pub model_alias: &'static str,
    pub allowed_tools: Option<&'static [&'static str]>,
}

pub const SUBAGENT_CONFIGS: &[SubagentConfig] = &[
    SubagentConfig {
        name: "coder",
        system_prompt: "You are a focused coding subagent. Make the requested change, \
                         run any checks available to you, and report exactly what changed.",
        model_alias: "smart",
        allowed_tools: None,
    },
    SubagentConfig {
        name: "researcher",
        system_prompt: "You are a research subagent. Gather facts from the codebase and the \
                         web, then answer with a concise, well-cited summary. Do not edit files.",
        model_alias: "smart",
        allowed_tools: Some(&["read", "grep", "glob", "ls", "codesearch", "webfetch", "websearch"]),
    },
    SubagentConfig {
        name: "reviewer",
        system_prompt: "You are a code review subagent. Read the relevant files and diagnostics, \
                         and report correctness, safety, and style issues. Do not edit files.",
        model_alias: "review",
        allowed_tools: Some(&["read", "grep", "glob", "ls", "diagnostics", "lsp"]),
    },
    SubagentConfig {
        name: "planner",
        system_prompt: "You are a planning subagent. Break the task into an ordered, concrete \
                         plan. Do not edit files; record steps with the todo tool if useful.",
        model_alias: "smart",
        allowed_tools: Some(&["read", "grep", "glob", "ls", "todo"]),
    },
    SubagentConfig {
        name: "oracle",
        system_prompt: "You are a reasoning subagent consulted for hard judgment calls. Answer \
                         from the prompt's own context; you have no tools available.",
        model_alias: "oracle",
        allowed_tools: Some(&[]),
    },
    SubagentConfig {
        name: "finder",
        system_prompt: "You are a fast codebase-search subagent. Locate the files, symbols, or \
                         patterns asked for and report paths and line numbers. Do not edit files.",
        model_alias: "finder",
        allowed_tools: Some(&["grep", "glob", "ls", "codesearch"]),
    },
    SubagentConfig {
        name: "librarian",
        system_prompt: "You are a documentation subagent. Read and summarize existing docs, \
                         comments, and READMEs relevant to the task. Do not edit files.",
        model_alias: "rush",
        allowed_tools: Some(&["read", "grep", "glob", "ls"]),
    },
];

pub fn find_config(subagent_type: &str) -> Option<&'static SubagentConfig> {
    SUBAGENT_CONFIGS.iter().find(|c| c.name == subagent_type)
}

pub fn known_types() -> Vec<&'static str> {
    SUBAGENT_CONFIGS.iter().map(|c| c.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_seven_configured_types_are_present() {
        let names = known_types();
        for expected in ["coder", "researcher", "reviewer", "planner", "oracle", "finder", "librarian"] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn unknown_type_resolves_to_none() {
        assert!(find_config("wizard").is_none());
    }

    #[test]
    fn oracle_has_no_tools() {
        let oracle = find_config("oracle").unwrap();
        assert_eq!(oracle.allowed_tools, Some(&[][..]));
    }
}
