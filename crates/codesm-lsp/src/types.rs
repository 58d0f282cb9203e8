//! Domain types returned by `LspClient`/`LspMultiplexer`, independent of
//! the wire representation. Ranges and positions are always 1-based;
//! conversion to/from LSP's 0-based positions happens at the client
//! boundary and nowhere else.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

impl Severity {
    pub fn from_lsp(value: Option<i64>) -> Self {
        match value {
            Some(1) => Severity::Error,
            Some(2) => Severity::Warning,
            Some(3) => Severity::Info,
            _ => Severity::Hint,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Hint => "hint",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
    pub severity: Severity,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Range {
    pub start_line: u32,
    pub start_char: u32,
    pub end_line: u32,
    pub end_char: u32,
}

impl Range {
    pub fn from_lsp(value: &Value) -> Self {
        let start = &value["start"];
        let end = &value["end"];
        Range {
            start_line: start["line"].as_u64().unwrap_or(0) as u32 + 1,
            start_char: start["character"].as_u64().unwrap_or(0) as u32 + 1,
            end_line: end["line"].as_u64().unwrap_or(0) as u32 + 1,
            end_char: end["character"].as_u64().unwrap_or(0) as u32 + 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub path: String,
    pub range: Range,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: i64,
    pub path: String,
    pub range: Range,
    pub container_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hover {
    pub contents: String,
    pub range: Option<Range>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHierarchyItem {
    pub name: String,
    pub kind: i64,
    pub path: String,
    pub range: Range,
    pub detail: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallHierarchyCall {
    pub item: CallHierarchyItem,
    pub from_ranges: Vec<Range>,
}

pub fn parse_hover_contents(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) => value.get("value").and_then(Value::as_str).unwrap_or("").to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                Value::Object(_) => item.get("value").and_then(Value::as_str).unwrap_or("").to_string(),
                _ => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}
