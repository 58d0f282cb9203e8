//! Built-in tool implementations.

use crate::Tool;
use std::sync::Arc;

pub mod bash;
pub mod codesearch;
pub mod edit;
pub mod diagnostics;
pub mod glob;
pub mod grep;
pub mod ls;
pub mod lsp;
pub mod mcp_execute;
pub mod multiedit;
pub mod parallel_tasks;
pub mod read;
pub mod task;
pub mod todo;
pub mod undo;
pub mod webfetch;
pub mod websearch;
pub mod write;

pub use bash::BashTool;
pub use codesearch::CodeSearchTool;
pub use diagnostics::DiagnosticsTool;
pub use edit::EditTool;
pub use glob::GlobTool;
pub use grep::GrepTool;
pub use ls::ListTool;
pub use lsp::LspTool;
pub use mcp_execute::McpExecuteTool;
pub use multiedit::MultiEditTool;
pub use parallel_tasks::ParallelTasksTool;
pub use read::ReadTool;
pub use task::TaskTool;
pub use todo::TodoTool;
pub use undo::UndoTool;
pub use webfetch::WebFetchTool;
pub use websearch::WebSearchTool;
pub use write::WriteTool;

/// Every built-in tool, freshly constructed. Callers add `mcp_*`-namespaced
/// tools and any LSP-discovered extras to the registry separately; this is
/// just the fixed set that ships with the crate.
pub fn all_builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(BashTool::new()),
        Arc::new(CodeSearchTool::new()),
        Arc::new(DiagnosticsTool::new()),
        Arc::new(EditTool::new()),
        Arc::new(GlobTool::new()),
        Arc::new(GrepTool::new()),
        Arc::new(ListTool::new()),
        Arc::new(LspTool::new()),
        Arc::new(McpExecuteTool::new()),
        Arc::new(MultiEditTool::new()),
        Arc::new(ParallelTasksTool::new()),
        Arc::new(ReadTool::new()),
        Arc::new(TaskTool::new()),
        Arc::new(TodoTool::new()),
        Arc::new(UndoTool::new()),
        Arc::new(WebFetchTool::new()),
        Arc::new(WebSearchTool::new()),
        Arc::new(WriteTool::new()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_one_instance_of_every_built_in_tool() {
        let tools = all_builtin_tools();
        assert_eq!(tools.len(), 18);
        let names: std::collections::HashSet<&str> = tools.iter().map(|t| t.name()).collect();
        assert!(names.contains("bash"));
        assert!(names.contains("task"));
        assert!(names.contains("parallel_tasks"));
        assert_eq!(names.len(), 18);
    }
}
