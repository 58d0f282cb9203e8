//! One JSON-RPC-over-stdio client per running language server. Content-Length
//! framing per the LSP wire spec. A single reader task demultiplexes incoming
//! messages: responses resolve pending request futures, server-originated
//! requests get an immediate no-op reply so the server never blocks waiting
//! on client capabilities we don't support, and `publishDiagnostics`
//! notifications land in a uri-keyed table read by `diagnostics()`.

use crate::error::LspError;
use crate::servers::{language_id, ServerConfig};
use crate::types::{parse_hover_contents, CallHierarchyCall, CallHierarchyItem, Diagnostic, Hover, Location, Range, Severity, Symbol};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

struct OpenDoc {
    version: i64,
}

pub struct LspClient {
    pub config: &'static ServerConfig,
    root_path: PathBuf,
    child: Child,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: Arc<Mutex<HashMap<i64, oneshot::Sender<Option<Value>>>>>,
    diagnostics: Arc<Mutex<HashMap<String, Vec<Diagnostic>>>>,
    open_docs: Arc<Mutex<HashMap<String, OpenDoc>>>,
    next_id: AtomicI64,
    initialized: AtomicBool,
    reader_task: Option<JoinHandle<()>>,
}

impl LspClient {
    pub async fn start(config: &'static ServerConfig, root_path: &Path) -> Result<Self, LspError> {
        if which::which(config.command[0]).is_err() {
            return Err(LspError::ExecutableNotFound(config.command[0].to_string()));
        }

        let mut command = tokio::process::Command::new(config.command[0]);
        command
            .args(&config.command[1..])
            .current_dir(root_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null());

        let mut child = command.spawn().map_err(|e| LspError::Spawn(e.to_string()))?;
        let stdin = Arc::new(Mutex::new(child.stdin.take().expect("piped stdin")));
        let stdout = child.stdout.take().expect("piped stdout");

        let pending = Arc::new(Mutex::new(HashMap::new()));
        let diagnostics = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = tokio::spawn(read_loop(
            BufReader::new(stdout),
            stdin.clone(),
            pending.clone(),
            diagnostics.clone(),
            config.name,
        ));

        Ok(Self {
            config,
            root_path: root_path.to_path_buf(),
            child,
            stdin,
            pending,
            diagnostics,
            open_docs: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicI64::new(0),
            initialized: AtomicBool::new(false),
            reader_task: Some(reader_task),
        })
    }

    pub async fn initialize(&self) -> Result<bool, LspError> {
        let root_path_abs = self.root_path.canonicalize().unwrap_or_else(|_| self.root_path.clone());
        let root_uri = path_to_uri(&root_path_abs);

        let params = json!({
            "processId": Value::Null,
            "rootUri": root_uri,
            "rootPath": root_path_abs.to_string_lossy(),
            "capabilities": {
                "textDocument": {
                    "publishDiagnostics": {"relatedInformation": true},
                    "synchronization": {"didOpen": true, "didChange": true, "didClose": true},
                    "definition": {"dynamicRegistration": false},
                    "references": {"dynamicRegistration": false},
                    "hover": {"dynamicRegistration": false, "contentFormat": ["plaintext", "markdown"]},
                    "documentSymbol": {"dynamicRegistration": false, "hierarchicalDocumentSymbolSupport": true},
                    "callHierarchy": {"dynamicRegistration": false},
                },
                "workspace": {
                    "symbol": {"dynamicRegistration": false},
                    "configuration": true,
                    "workspaceFolders": true,
                },
            },
            "workspaceFolders": [{
                "uri": root_uri,
                "name": root_path_abs.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default(),
            }],
        });

        match self.request("initialize", params, DEFAULT_TIMEOUT).await? {
            Some(_result) => {
                self.notify("initialized", json!({})).await?;
                self.initialized.store(true, Ordering::SeqCst);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root_path.join(p)
        }
    }

    pub async fn did_open(&self, path: &str, text: Option<String>) -> Result<(), LspError> {
        if !self.is_initialized() {
            return Ok(());
        }
        let abs = self.resolve(path);
        let uri = path_to_uri(&abs);

        if self.open_docs.lock().await.contains_key(&uri) {
            return Ok(());
        }

        let text = match text {
            Some(t) => t,
            None => match tokio::fs::read_to_string(&abs).await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(path = %abs.display(), error = %e, "failed to read file for didOpen");
                    return Ok(());
                }
            },
        };

        self.open_docs.lock().await.insert(uri.clone(), OpenDoc { version: 1 });

        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": language_id(&abs.to_string_lossy()),
                    "version": 1,
                    "text": text,
                }
            }),
        )
        .await
    }

    pub async fn did_change(&self, path: &str, text: String) -> Result<(), LspError> {
        if !self.is_initialized() {
            return Ok(());
        }
        let abs = self.resolve(path);
        let uri = path_to_uri(&abs);

        let version = {
            let mut docs = self.open_docs.lock().await;
            match docs.get_mut(&uri) {
                Some(doc) => {
                    doc.version += 1;
                    doc.version
                }
                None => {
                    drop(docs);
                    return self.did_open(path, Some(text)).await;
                }
            }
        };

        self.notify(
            "textDocument/didChange",
            json!({
                "textDocument": {"uri": uri, "version": version},
                "contentChanges": [{"text": text}],
            }),
        )
        .await
    }

    async fn ensure_open(&self, path: &str) -> Result<String, LspError> {
        let abs = self.resolve(path);
        let uri = path_to_uri(&abs);
        if !self.open_docs.lock().await.contains_key(&uri) {
            self.did_open(path, None).await?;
        }
        Ok(uri)
    }

    pub async fn diagnostics_for(&self, path: Option<&str>) -> Vec<Diagnostic> {
        let table = self.diagnostics.lock().await;
        match path {
            Some(p) => table.get(p).cloned().unwrap_or_default(),
            None => table.values().flatten().cloned().collect(),
        }
    }

    pub async fn definition(&self, path: &str, line: u32, character: u32) -> Result<Vec<Location>, LspError> {
        if !self.is_initialized() {
            return Ok(Vec::new());
        }
        let uri = self.ensure_open(path).await?;
        let result = self
            .request(
                "textDocument/definition",
                json!({"textDocument": {"uri": uri}, "position": {"line": line - 1, "character": character - 1}}),
                DEFAULT_TIMEOUT,
            )
            .await?;
        Ok(parse_locations(result))
    }

    pub async fn references(&self, path: &str, line: u32, character: u32, include_declaration: bool) -> Result<Vec<Location>, LspError> {
        if !self.is_initialized() {
            return Ok(Vec::new());
        }
        let uri = self.ensure_open(path).await?;
        let result = self
            .request(
                "textDocument/references",
                json!({
                    "textDocument": {"uri": uri},
                    "position": {"line": line - 1, "character": character - 1},
                    "context": {"includeDeclaration": include_declaration},
                }),
                DEFAULT_TIMEOUT,
            )
            .await?;
        Ok(parse_locations(result))
    }

    pub async fn hover(&self, path: &str, line: u32, character: u32) -> Result<Option<Hover>, LspError> {
        if !self.is_initialized() {
            return Ok(None);
        }
        let uri = self.ensure_open(path).await?;
        let result = self
            .request(
                "textDocument/hover",
                json!({"textDocument": {"uri": uri}, "position": {"line": line - 1, "character": character - 1}}),
                DEFAULT_TIMEOUT,
            )
            .await?;
        let Some(result) = result else { return Ok(None) };
        if result.is_null() {
            return Ok(None);
        }
        let contents = parse_hover_contents(result.get("contents").unwrap_or(&Value::Null));
        let range = result.get("range").map(Range::from_lsp);
        Ok(Some(Hover { contents, range }))
    }

    pub async fn document_symbols(&self, path: &str) -> Result<Vec<Symbol>, LspError> {
        if !self.is_initialized() {
            return Ok(Vec::new());
        }
        let uri = self.ensure_open(path).await?;
        let abs = uri_to_path(&uri);
        let result = self
            .request("textDocument/documentSymbol", json!({"textDocument": {"uri": uri}}), DEFAULT_TIMEOUT)
            .await?;
        let Some(Value::Array(items)) = result else { return Ok(Vec::new()) };
        if items.is_empty() {
            return Ok(Vec::new());
        }
        if items[0].get("range").is_some() || items[0].get("selectionRange").is_some() {
            Ok(flatten_document_symbols(&items, &abs, None))
        } else {
            Ok(items.iter().map(|sym| parse_symbol(sym, &abs)).collect())
        }
    }

    pub async fn workspace_symbols(&self, query: &str) -> Result<Vec<Symbol>, LspError> {
        if !self.is_initialized() {
            return Ok(Vec::new());
        }
        let result = self.request("workspace/symbol", json!({"query": query}), DEFAULT_TIMEOUT).await?;
        let Some(Value::Array(items)) = result else { return Ok(Vec::new()) };
        Ok(items.iter().map(|sym| parse_symbol(sym, "")).collect())
    }

    pub async fn prepare_call_hierarchy(&self, path: &str, line: u32, character: u32) -> Result<Vec<CallHierarchyItem>, LspError> {
        if !self.is_initialized() {
            return Ok(Vec::new());
        }
        let uri = self.ensure_open(path).await?;
        let result = self
            .request(
                "textDocument/prepareCallHierarchy",
                json!({"textDocument": {"uri": uri}, "position": {"line": line - 1, "character": character - 1}}),
                DEFAULT_TIMEOUT,
            )
            .await?;
        let Some(Value::Array(items)) = result else { return Ok(Vec::new()) };
        Ok(items.iter().map(parse_call_hierarchy_item).collect())
    }

    pub async fn incoming_calls(&self, item: &CallHierarchyItem) -> Result<Vec<CallHierarchyCall>, LspError> {
        if !self.is_initialized() {
            return Ok(Vec::new());
        }
        let result = self.request("callHierarchy/incomingCalls", json!({"item": item.raw}), DEFAULT_TIMEOUT).await?;
        Ok(parse_call_hierarchy_calls(result, "from"))
    }

    pub async fn outgoing_calls(&self, item: &CallHierarchyItem) -> Result<Vec<CallHierarchyCall>, LspError> {
        if !self.is_initialized() {
            return Ok(Vec::new());
        }
        let result = self.request("callHierarchy/outgoingCalls", json!({"item": item.raw}), DEFAULT_TIMEOUT).await?;
        Ok(parse_call_hierarchy_calls(result, "to"))
    }

    pub async fn shutdown(mut self) {
        if self.is_initialized() {
            let _ = self.request("shutdown", Value::Null, Duration::from_secs(5)).await;
            let _ = self.notify("exit", Value::Null).await;
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        self.initialized.store(false, Ordering::SeqCst);
        let _ = self.child.start_kill();
        let _ = tokio::time::timeout(Duration::from_secs(2), self.child.wait()).await;
    }

    async fn request(&self, method: &str, params: Value, timeout: Duration) -> Result<Option<Value>, LspError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Ok(None),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                tracing::warn!(server = %self.config.name, %method, "LSP request timed out");
                Ok(None)
            }
        }
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), LspError> {
        self.send(json!({"jsonrpc": "2.0", "method": method, "params": params})).await
    }

    async fn send(&self, message: Value) -> Result<(), LspError> {
        let content = serde_json::to_vec(&message).map_err(|e| LspError::Transport(e.to_string()))?;
        let header = format!("Content-Length: {}\r\n\r\n", content.len());
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(header.as_bytes()).await.map_err(|e| LspError::Transport(e.to_string()))?;
        stdin.write_all(&content).await.map_err(|e| LspError::Transport(e.to_string()))?;
        stdin.flush().await.map_err(|e| LspError::Transport(e.to_string()))
    }
}

async fn read_loop(
    mut reader: BufReader<tokio::process::ChildStdout>,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: Arc<Mutex<HashMap<i64, oneshot::Sender<Option<Value>>>>>,
    diagnostics: Arc<Mutex<HashMap<String, Vec<Diagnostic>>>>,
    server_name: &'static str,
) {
    loop {
        let content_length = match read_header(&mut reader).await {
            Some(len) => len,
            None => break,
        };

        let mut buf = vec![0u8; content_length];
        if reader.read_exact(&mut buf).await.is_err() {
            break;
        }

        let message: Value = match serde_json::from_slice(&buf) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(server = %server_name, error = %e, "invalid JSON from language server");
                continue;
            }
        };

        handle_message(message, &stdin, &pending, &diagnostics, server_name).await;
    }
}

async fn read_header(reader: &mut BufReader<tokio::process::ChildStdout>) -> Option<usize> {
    let mut content_length = None;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.ok()?;
        if n == 0 {
            return None;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return content_length;
        }
        if let Some(value) = trimmed.to_ascii_lowercase().strip_prefix("content-length:").map(|s| s.trim().to_string()) {
            content_length = value.parse().ok();
        }
    }
}

async fn handle_message(
    message: Value,
    stdin: &Arc<Mutex<ChildStdin>>,
    pending: &Arc<Mutex<HashMap<i64, oneshot::Sender<Option<Value>>>>>,
    diagnostics: &Arc<Mutex<HashMap<String, Vec<Diagnostic>>>>,
    server_name: &'static str,
) {
    let id = message.get("id").and_then(Value::as_i64);

    if let (Some(id), Some(result)) = (id, message.get("result")) {
        if let Some(tx) = pending.lock().await.remove(&id) {
            let _ = tx.send(Some(result.clone()));
        }
        return;
    }

    if let (Some(id), Some(error)) = (id, message.get("error")) {
        tracing::warn!(server = %server_name, %error, "LSP error response");
        if let Some(tx) = pending.lock().await.remove(&id) {
            let _ = tx.send(None);
        }
        return;
    }

    let method = message.get("method").and_then(Value::as_str);

    if let (Some(id), Some(method)) = (id, method) {
        let result = match method {
            "workspace/configuration" => json!([{}]),
            _ => Value::Null,
        };
        let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
        if let Ok(content) = serde_json::to_vec(&response) {
            let header = format!("Content-Length: {}\r\n\r\n", content.len());
            let mut stdin = stdin.lock().await;
            let _ = stdin.write_all(header.as_bytes()).await;
            let _ = stdin.write_all(&content).await;
            let _ = stdin.flush().await;
        }
        return;
    }

    if let Some("textDocument/publishDiagnostics") = method {
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let uri = params.get("uri").and_then(Value::as_str).unwrap_or_default();
        let path = uri_to_path(uri);
        let items = params
            .get("diagnostics")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
            .iter()
            .map(|d| Diagnostic {
                path: path.clone(),
                line: d["range"]["start"]["line"].as_u64().unwrap_or(0) as u32 + 1,
                column: d["range"]["start"]["character"].as_u64().unwrap_or(0) as u32 + 1,
                message: d["message"].as_str().unwrap_or_default().to_string(),
                severity: Severity::from_lsp(d.get("severity").and_then(Value::as_i64)),
                source: d.get("source").and_then(Value::as_str).map(str::to_string),
            })
            .collect();
        diagnostics.lock().await.insert(path, items);
    }
}

pub fn path_to_uri(path: &Path) -> String {
    url::Url::from_file_path(path).map(|u| u.to_string()).unwrap_or_else(|_| format!("file://{}", path.display()))
}

pub fn uri_to_path(uri: &str) -> String {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| uri.to_string())
}

fn parse_locations(result: Option<Value>) -> Vec<Location> {
    let Some(result) = result else { return Vec::new() };
    let items = match result {
        Value::Array(items) => items,
        Value::Object(_) => vec![result],
        _ => return Vec::new(),
    };
    items.iter().filter_map(parse_location).collect()
}

fn parse_location(value: &Value) -> Option<Location> {
    let uri = value.get("uri").and_then(Value::as_str)?;
    let range = value.get("range")?;
    Some(Location { path: uri_to_path(uri), range: Range::from_lsp(range) })
}

fn parse_symbol(sym: &Value, default_path: &str) -> Symbol {
    let (path, range_value) = match sym.get("location") {
        Some(location) => (
            location.get("uri").and_then(Value::as_str).map(uri_to_path).unwrap_or_default(),
            location.get("range").cloned().unwrap_or(Value::Null),
        ),
        None => (default_path.to_string(), sym.get("range").or_else(|| sym.get("selectionRange")).cloned().unwrap_or(Value::Null)),
    };
    Symbol {
        name: sym.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        kind: sym.get("kind").and_then(Value::as_i64).unwrap_or(0),
        path,
        range: Range::from_lsp(&range_value),
        container_name: sym.get("containerName").and_then(Value::as_str).map(str::to_string),
    }
}

fn flatten_document_symbols(symbols: &[Value], path: &str, container: Option<&str>) -> Vec<Symbol> {
    let mut result = Vec::new();
    for sym in symbols {
        let range_value = sym.get("selectionRange").or_else(|| sym.get("range")).cloned().unwrap_or(Value::Null);
        let name = sym.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
        result.push(Symbol {
            name: name.clone(),
            kind: sym.get("kind").and_then(Value::as_i64).unwrap_or(0),
            path: path.to_string(),
            range: Range::from_lsp(&range_value),
            container_name: container.map(str::to_string),
        });
        if let Some(children) = sym.get("children").and_then(Value::as_array) {
            if !children.is_empty() {
                result.extend(flatten_document_symbols(children, path, Some(&name)));
            }
        }
    }
    result
}

fn parse_call_hierarchy_item(item: &Value) -> CallHierarchyItem {
    let range_value = item.get("selectionRange").or_else(|| item.get("range")).cloned().unwrap_or(Value::Null);
    CallHierarchyItem {
        name: item.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        kind: item.get("kind").and_then(Value::as_i64).unwrap_or(0),
        path: item.get("uri").and_then(Value::as_str).map(uri_to_path).unwrap_or_default(),
        range: Range::from_lsp(&range_value),
        detail: item.get("detail").and_then(Value::as_str).map(str::to_string),
        raw: item.clone(),
    }
}

fn parse_call_hierarchy_calls(result: Option<Value>, item_key: &str) -> Vec<CallHierarchyCall> {
    let Some(Value::Array(calls)) = result else { return Vec::new() };
    calls
        .iter()
        .filter_map(|call| {
            let item_value = call.get(item_key)?;
            let item = parse_call_hierarchy_item(item_value);
            let from_ranges = call
                .get("fromRanges")
                .and_then(Value::as_array)
                .map(|ranges| ranges.iter().map(Range::from_lsp).collect())
                .unwrap_or_default();
            Some(CallHierarchyCall { item, from_ranges })
        })
        .collect()
}
