//! The `lsp` facade: one multiplexer per session, owning every running
//! client and routing path-based requests to whichever clients handle
//! the file's extension.

use crate::client::LspClient;
use crate::error::LspError;
use crate::servers::{server_config, servers_for_file};
use crate::types::{CallHierarchyCall, Diagnostic, Hover, Location, Symbol};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::RwLock;

pub enum CallDirection {
    Incoming,
    Outgoing,
}

pub struct LspMultiplexer {
    root_path: PathBuf,
    clients: RwLock<HashMap<String, LspClient>>,
}

impl LspMultiplexer {
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self { root_path: root_path.into(), clients: RwLock::new(HashMap::new()) }
    }

    /// Starts every server named in `keys` whose executable resolves on
    /// PATH. Unknown keys and missing executables are reported as `false`
    /// rather than raised.
    pub async fn init(&self, keys: &[String]) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for key in keys {
            let Some(config) = server_config(key) else {
                tracing::warn!(server = %key, "unknown LSP server key");
                results.insert(key.clone(), false);
                continue;
            };

            let started = match LspClient::start(config, &self.root_path).await {
                Ok(client) => match client.initialize().await {
                    Ok(true) => {
                        tracing::info!(server = %config.name, "started LSP server");
                        self.clients.write().await.insert(key.clone(), client);
                        true
                    }
                    Ok(false) => {
                        tracing::warn!(server = %config.name, "LSP server rejected initialize");
                        client.shutdown().await;
                        false
                    }
                    Err(e) => {
                        tracing::warn!(server = %config.name, error = %e, "LSP initialize failed");
                        client.shutdown().await;
                        false
                    }
                },
                Err(e) => {
                    tracing::warn!(server = %key, error = %e, "failed to start LSP server");
                    false
                }
            };
            results.insert(key.clone(), started);
        }
        results
    }

    /// Picks servers by scanning the workspace for files each server's
    /// extensions match, then starting any whose executable is on PATH.
    pub async fn init_auto(&self) -> HashMap<String, bool> {
        let mut candidates = Vec::new();
        for entry in walk_files(&self.root_path, 4) {
            let path_str = entry.to_string_lossy().to_string();
            for key in servers_for_file(&path_str) {
                if !candidates.contains(&key) {
                    candidates.push(key);
                }
            }
        }
        let keys: Vec<String> = candidates.into_iter().map(str::to_string).collect();
        self.init(&keys).await
    }

    fn resolve_path(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root_path.join(p)
        }
    }

    async fn clients_for_file(&self, path: &str) -> Vec<String> {
        let keys = servers_for_file(path);
        let clients = self.clients.read().await;
        keys.into_iter().filter(|k| clients.contains_key(*k)).map(str::to_string).collect()
    }

    pub async fn touch_file(&self, path: &str, wait_for_diagnostics: bool, timeout: Duration) -> Result<Vec<Diagnostic>, LspError> {
        let abs = self.resolve_path(path).to_string_lossy().to_string();
        let active = self.clients_for_file(&abs).await;
        if active.is_empty() {
            return Ok(Vec::new());
        }

        let clients = self.clients.read().await;
        for key in &active {
            if let Some(client) = clients.get(key) {
                client.did_open(&abs, None).await?;
            }
        }
        drop(clients);

        if wait_for_diagnostics {
            tokio::time::sleep(timeout.min(Duration::from_secs(2))).await;
        }

        let clients = self.clients.read().await;
        let mut all = Vec::new();
        for key in &active {
            if let Some(client) = clients.get(key) {
                all.extend(client.diagnostics_for(Some(&abs)).await);
            }
        }
        Ok(all)
    }

    pub async fn diagnostics(&self, path: Option<&str>) -> Vec<Diagnostic> {
        let abs = path.map(|p| self.resolve_path(p).to_string_lossy().to_string());
        let clients = self.clients.read().await;
        let mut all = Vec::new();
        for client in clients.values() {
            all.extend(client.diagnostics_for(abs.as_deref()).await);
        }
        all
    }

    pub async fn definition(&self, path: &str, line: u32, column: u32) -> Result<Vec<Location>, LspError> {
        let abs = self.resolve_path(path).to_string_lossy().to_string();
        let active = self.clients_for_file(&abs).await;
        let clients = self.clients.read().await;
        let mut all = Vec::new();
        for key in &active {
            if let Some(client) = clients.get(key) {
                all.extend(client.definition(&abs, line, column).await?);
            }
        }
        Ok(all)
    }

    pub async fn references(&self, path: &str, line: u32, column: u32, include_declaration: bool) -> Result<Vec<Location>, LspError> {
        let abs = self.resolve_path(path).to_string_lossy().to_string();
        let active = self.clients_for_file(&abs).await;
        let clients = self.clients.read().await;
        let mut all = Vec::new();
        for key in &active {
            if let Some(client) = clients.get(key) {
                all.extend(client.references(&abs, line, column, include_declaration).await?);
            }
        }
        Ok(all)
    }

    pub async fn hover(&self, path: &str, line: u32, column: u32) -> Result<Option<Hover>, LspError> {
        let abs = self.resolve_path(path).to_string_lossy().to_string();
        let active = self.clients_for_file(&abs).await;
        let clients = self.clients.read().await;
        for key in &active {
            if let Some(client) = clients.get(key) {
                if let Some(hover) = client.hover(&abs, line, column).await? {
                    return Ok(Some(hover));
                }
            }
        }
        Ok(None)
    }

    pub async fn document_symbols(&self, path: &str) -> Result<Vec<Symbol>, LspError> {
        let abs = self.resolve_path(path).to_string_lossy().to_string();
        let active = self.clients_for_file(&abs).await;
        let clients = self.clients.read().await;
        let mut all = Vec::new();
        for key in &active {
            if let Some(client) = clients.get(key) {
                all.extend(client.document_symbols(&abs).await?);
            }
        }
        Ok(all)
    }

    pub async fn workspace_symbols(&self, query: &str) -> Result<Vec<Symbol>, LspError> {
        let clients = self.clients.read().await;
        let mut all = Vec::new();
        for client in clients.values() {
            all.extend(client.workspace_symbols(query).await?);
        }
        Ok(all)
    }

    pub async fn call_hierarchy(&self, path: &str, line: u32, column: u32, direction: CallDirection) -> Result<Vec<CallHierarchyCall>, LspError> {
        let abs = self.resolve_path(path).to_string_lossy().to_string();
        let active = self.clients_for_file(&abs).await;
        let clients = self.clients.read().await;
        let mut all = Vec::new();
        for key in &active {
            let Some(client) = clients.get(key) else { continue };
            for item in client.prepare_call_hierarchy(&abs, line, column).await? {
                let calls = match direction {
                    CallDirection::Incoming => client.incoming_calls(&item).await?,
                    CallDirection::Outgoing => client.outgoing_calls(&item).await?,
                };
                all.extend(calls);
            }
        }
        Ok(all)
    }

    pub async fn status(&self) -> HashMap<String, bool> {
        let clients = self.clients.read().await;
        clients.iter().map(|(key, client)| (key.clone(), client.is_initialized())).collect()
    }

    pub async fn shutdown(&self) {
        let mut clients = self.clients.write().await;
        for (_, client) in clients.drain() {
            client.shutdown().await;
        }
    }
}

fn walk_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk_inner(root, max_depth, &mut out);
    out
}

fn walk_inner(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth == 0 {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if path.file_name().and_then(|n| n.to_str()).map(|n| n.starts_with('.') || n == "node_modules" || n == "target").unwrap_or(false) {
                continue;
            }
            walk_inner(&path, depth - 1, out);
        } else {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_files_skips_hidden_and_vendored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/config"), "").unwrap();
        std::fs::create_dir(dir.path().join("node_modules")).unwrap();
        std::fs::write(dir.path().join("node_modules/pkg.js"), "").unwrap();

        let files = walk_files(dir.path(), 4);
        assert!(files.iter().any(|p| p.ends_with("main.rs")));
        assert!(!files.iter().any(|p| p.to_string_lossy().contains(".git")));
        assert!(!files.iter().any(|p| p.to_string_lossy().contains("node_modules")));
    }
}
