//! `lsp`: routes navigation/hover/symbol requests to the right language client.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use codesm_lsp::{CallDirection, Location, Range, Symbol};
use serde_json::{json, Value};

pub struct LspTool;

impl LspTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LspTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps the LSP `SymbolKind` numeric enum to its name, per the protocol spec.
fn symbol_kind_name(kind: i64) -> &'static str {
    match kind {
        1 => "file",
        2 => "module",
        3 => "namespace",
        4 => "package",
        5 => "class",
        6 => "method",
        7 => "property",
        8 => "field",
        9 => "constructor",
        10 => "enum",
        11 => "interface",
        12 => "function",
        13 => "variable",
        14 => "constant",
        15 => "string",
        16 => "number",
        17 => "boolean",
        18 => "array",
        19 => "object",
        20 => "key",
        21 => "null",
        22 => "enum_member",
        23 => "struct",
        24 => "event",
        25 => "operator",
        26 => "type_parameter",
        _ => "unknown",
    }
}

fn render_location(loc: &Location) -> Value {
    json!({ "path": loc.path, "range": render_range(&loc.range) })
}

fn render_range(range: &Range) -> Value {
    json!({
        "start_line": range.start_line,
        "start_char": range.start_char,
        "end_line": range.end_line,
        "end_char": range.end_char,
    })
}

fn render_symbol(symbol: &Symbol) -> Value {
    json!({
        "name": symbol.name,
        "kind": symbol_kind_name(symbol.kind),
        "path": symbol.path,
        "range": render_range(&symbol.range),
        "container_name": symbol.container_name,
    })
}

fn require_position(args: &Value) -> Result<(String, u32, u32), ToolError> {
    let path = args.get("path").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?.to_string();
    let line = args.get("line").and_then(Value::as_u64).ok_or_else(|| ToolError::InvalidRequest("line is required".to_string()))? as u32;
    let column = args.get("column").and_then(Value::as_u64).ok_or_else(|| ToolError::InvalidRequest("column is required".to_string()))? as u32;
    Ok((path, line, column))
}

#[async_trait]
impl Tool for LspTool {
    fn name(&self) -> &str {
        "lsp"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Query a running language server: go to definition, find references, \
             hover, document/workspace symbols, or call hierarchy.",
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["definition", "references", "hover", "document_symbols", "workspace_symbols", "call_hierarchy_incoming", "call_hierarchy_outgoing"]
                    },
                    "path": { "type": "string" },
                    "line": { "type": "integer" },
                    "column": { "type": "integer" },
                    "query": { "type": "string", "description": "Query text for workspace_symbols." },
                    "include_declaration": { "type": "boolean", "default": true }
                },
                "required": ["action"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[CapabilityRequirement::Filesystem]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let Some(lsp) = context.lsp() else {
            return Err(ToolError::InvalidRequest("no LSP multiplexer configured for this session".to_string()));
        };

        let action = args.get("action").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("action is required".to_string()))?;

        let result = match action {
            "definition" => {
                let (path, line, column) = require_position(&args)?;
                let locations = lsp.definition(&path, line, column).await?;
                json!({ "locations": locations.iter().map(render_location).collect::<Vec<_>>() })
            }
            "references" => {
                let (path, line, column) = require_position(&args)?;
                let include_declaration = args.get("include_declaration").and_then(Value::as_bool).unwrap_or(true);
                let locations = lsp.references(&path, line, column, include_declaration).await?;
                json!({ "locations": locations.iter().map(render_location).collect::<Vec<_>>() })
            }
            "hover" => {
                let (path, line, column) = require_position(&args)?;
                let hover = lsp.hover(&path, line, column).await?;
                match hover {
                    Some(h) => json!({ "contents": h.contents, "range": h.range.map(|r| render_range(&r)) }),
                    None => json!({ "contents": Value::Null }),
                }
            }
            "document_symbols" => {
                let path = args.get("path").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("path is required".to_string()))?;
                let symbols = lsp.document_symbols(path).await?;
                json!({ "symbols": symbols.iter().map(render_symbol).collect::<Vec<_>>() })
            }
            "workspace_symbols" => {
                let query = args.get("query").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("query is required".to_string()))?;
                let symbols = lsp.workspace_symbols(query).await?;
                json!({ "symbols": symbols.iter().map(render_symbol).collect::<Vec<_>>() })
            }
            "call_hierarchy_incoming" | "call_hierarchy_outgoing" => {
                let (path, line, column) = require_position(&args)?;
                let direction = if action == "call_hierarchy_incoming" { CallDirection::Incoming } else { CallDirection::Outgoing };
                let calls = lsp.call_hierarchy(&path, line, column, direction).await?;
                json!({
                    "calls": calls.iter().map(|c| json!({
                        "name": c.item.name,
                        "kind": symbol_kind_name(c.item.kind),
                        "path": c.item.path,
                        "range": render_range(&c.item.range),
                        "from_ranges": c.from_ranges.iter().map(render_range).collect::<Vec<_>>(),
                    })).collect::<Vec<_>>()
                })
            }
            other => return Err(ToolError::InvalidRequest(format!("unknown lsp action '{other}'"))),
        };

        serde_json::to_string(&result).map_err(|e| ToolError::ProviderError(format!("serialize failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentToolContext;
    use tempfile::TempDir;

    #[tokio::test]
    async fn errors_without_an_lsp_multiplexer() {
        let dir = TempDir::new().unwrap();
        let context = AgentToolContext::basic("s1".to_string(), Some(dir.path().to_path_buf()));

        let err = LspTool::new().call(json!({ "action": "hover", "path": "a.rs", "line": 1, "column": 1 }), &context).await.unwrap_err();
        assert!(err.to_string().contains("no LSP multiplexer"));
    }

    #[test]
    fn symbol_kinds_render_to_known_names() {
        assert_eq!(symbol_kind_name(12), "function");
        assert_eq!(symbol_kind_name(5), "class");
        assert_eq!(symbol_kind_name(999), "unknown");
    }
}
