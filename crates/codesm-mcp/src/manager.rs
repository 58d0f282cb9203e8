//! Aggregates all configured MCP clients, namespaces their tools as
//! `mcp_<server>_<tool>`, and routes tool calls to the owning client.

use crate::client::McpClient;
use crate::config::{McpServerConfig, McpServersFile};
use crate::error::McpError;
use codesm_core::ToolSchema;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct McpManager {
    clients: RwLock<HashMap<String, McpClient>>,
    /// Servers whose client was torn down after a fatal error; calls to
    /// their tools return "unavailable" instead of "unknown server".
    unavailable: RwLock<Vec<String>>,
}

impl Default for McpManager {
    fn default() -> Self {
        Self { clients: RwLock::new(HashMap::new()), unavailable: RwLock::new(Vec::new()) }
    }
}

impl McpManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn connect_all(&self, file: &McpServersFile) {
        for config in &file.servers {
            self.connect_one(config).await;
        }
    }

    pub async fn connect_one(&self, config: &McpServerConfig) {
        match McpClient::connect(config).await {
            Ok(client) => {
                tracing::info!(server = %config.name, tools = client.tools.len(), "connected MCP server");
                self.clients.write().await.insert(config.name.clone(), client);
            }
            Err(e) => {
                tracing::warn!(server = %config.name, error = %e, "failed to connect MCP server, it will not appear in the registry");
            }
        }
    }

    /// Tears down a client after a fatal internal error (JSON-RPC framing
    /// corruption, lost stdio). Its tools vanish from the registry; later
    /// calls return `McpError::Unavailable` instead of failing the agent.
    pub async fn mark_fatal(&self, server: &str) {
        if let Some(client) = self.clients.write().await.remove(server) {
            client.shutdown().await;
        }
        self.unavailable.write().await.push(server.to_string());
    }

    /// All discovered tools across every connected server, namespaced for
    /// the tool registry.
    pub async fn discovered_tool_schemas(&self) -> Vec<ToolSchema> {
        let clients = self.clients.read().await;
        let mut schemas = Vec::new();
        for client in clients.values() {
            for tool in &client.tools {
                let input_schema = serde_json::to_value(tool.input_schema.as_ref()).unwrap_or(serde_json::json!({}));
                schemas.push(ToolSchema::new(
                    ToolSchema::mcp_name(&client.name, &tool.name),
                    tool.description.clone().unwrap_or_default().into_owned(),
                    input_schema,
                ));
            }
        }
        schemas
    }

    /// Renders the discovered server/tool tree as text, so the model can
    /// explore capabilities before writing a sandbox script.
    pub async fn render_tool_tree(&self) -> String {
        let clients = self.clients.read().await;
        if clients.is_empty() {
            return "No MCP servers are connected.".to_string();
        }
        let mut out = String::new();
        for client in clients.values() {
            out.push_str(&format!("{}:\n", client.name));
            for tool in &client.tools {
                out.push_str(&format!(
                    "  - {}: {}\n",
                    tool.name,
                    tool.description.as_deref().unwrap_or("")
                ));
            }
        }
        out
    }

    pub async fn call_tool(&self, server: &str, tool: &str, args: Value) -> Result<String, McpError> {
        if self.unavailable.read().await.iter().any(|s| s == server) {
            return Err(McpError::Unavailable(server.to_string()));
        }
        let clients = self.clients.read().await;
        let client = clients.get(server).ok_or_else(|| McpError::UnknownServer(server.to_string()))?;
        client.call_tool(tool, args).await
    }

    pub async fn server_names(&self) -> Vec<String> {
        self.clients.read().await.keys().cloned().collect()
    }
}
