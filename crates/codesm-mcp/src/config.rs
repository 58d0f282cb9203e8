//! MCP server descriptor file: the first existing path among four
//! candidates wins, searched in this exact order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct McpServersFile {
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct McpServerConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: McpTransportConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "transport", rename_all = "lowercase")]
pub enum McpTransportConfig {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Sse {
        url: String,
    },
    #[serde(rename = "streamable-http")]
    StreamableHttp {
        url: String,
    },
}

/// Search order, first existing file wins: `./mcp-servers.json`,
/// `./.mcp/servers.json`, `./codesm.json`, `~/.config/codesm/mcp.json`.
pub fn descriptor_search_paths(cwd: &Path) -> Vec<PathBuf> {
    let mut paths = vec![
        cwd.join("mcp-servers.json"),
        cwd.join(".mcp").join("servers.json"),
        cwd.join("codesm.json"),
    ];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("codesm").join("mcp.json"));
    }
    paths
}

pub async fn load_descriptor(cwd: &Path) -> Option<McpServersFile> {
    for path in descriptor_search_paths(cwd) {
        if !path.exists() {
            continue;
        }
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<McpServersFile>(&content) {
                Ok(parsed) => {
                    tracing::info!(path = %path.display(), "loaded MCP server descriptor");
                    return Some(parsed);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "MCP descriptor is not valid JSON, skipping");
                    return None;
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read MCP descriptor");
                return None;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_order_is_stdio_then_scoped_then_app() {
        let cwd = PathBuf::from("/work");
        let paths = descriptor_search_paths(&cwd);
        assert_eq!(paths[0], PathBuf::from("/work/mcp-servers.json"));
        assert_eq!(paths[1], PathBuf::from("/work/.mcp/servers.json"));
        assert_eq!(paths[2], PathBuf::from("/work/codesm.json"));
    }

    #[test]
    fn parses_stdio_server_config() {
        let json = r#"{"servers": [{"name": "filesystem", "transport": "stdio", "command": "npx", "args": ["-y", "server-filesystem"]}]}"#;
        let parsed: McpServersFile = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.servers.len(), 1);
        assert_eq!(parsed.servers[0].name, "filesystem");
        match &parsed.servers[0].transport {
            McpTransportConfig::Stdio { command, .. } => assert_eq!(command, "npx"),
            _ => panic!("expected stdio transport"),
        }
    }
}
