//! `todo`: maintains an ordered todo list scoped to a session.

use crate::context::{CapabilityRequirement, Tool, ToolContext};
use crate::error::ToolError;
use async_trait::async_trait;
use codesm_core::ToolSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TodoItem {
    id: String,
    content: String,
    status: String,
    priority: String,
}

type Storage = Mutex<HashMap<String, Vec<TodoItem>>>;

fn storage() -> &'static Storage {
    static STORAGE: OnceLock<Storage> = OnceLock::new();
    STORAGE.get_or_init(|| Mutex::new(HashMap::new()))
}

pub struct TodoTool;

impl TodoTool {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TodoTool {
    fn default() -> Self {
        Self::new()
    }
}

fn summary(todos: &[TodoItem]) -> Value {
    json!({
        "todos": todos,
        "total": todos.len(),
        "pending": todos.iter().filter(|t| t.status == "pending").count(),
        "in_progress": todos.iter().filter(|t| t.status == "in_progress").count(),
        "completed": todos.iter().filter(|t| t.status == "completed").count(),
        "cancelled": todos.iter().filter(|t| t.status == "cancelled").count(),
    })
}

fn find_mut<'a>(todos: &'a mut [TodoItem], id: &str) -> Result<&'a mut TodoItem, ToolError> {
    todos.iter_mut().find(|t| t.id == id).ok_or_else(|| ToolError::InvalidRequest(format!("no todo with id '{id}'")))
}

#[async_trait]
impl Tool for TodoTool {
    fn name(&self) -> &str {
        "todo"
    }

    fn definition(&self) -> ToolSchema {
        ToolSchema::new(
            self.name(),
            "Maintain an ordered todo list for the current session. Use `add` to append \
             an item, `start`/`done`/`cancel` to change its status, `update` to edit its \
             content or priority, `delete` to remove it, `clear_done` to drop completed \
             items, and `list` to read the full list back.",
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["add", "list", "start", "done", "cancel", "update", "delete", "clear_done"]
                    },
                    "id": { "type": "string", "description": "Required for start/done/cancel/update/delete." },
                    "content": { "type": "string", "description": "Required for add; optional for update." },
                    "priority": {
                        "type": "string",
                        "enum": ["high", "medium", "low"],
                        "description": "Optional for add/update. Defaults to medium on add."
                    }
                },
                "required": ["action"]
            }),
        )
    }

    fn required_capabilities(&self) -> &'static [CapabilityRequirement] {
        &[]
    }

    async fn call(&self, args: Value, context: &dyn ToolContext) -> Result<String, ToolError> {
        let action = args.get("action").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("action is required".to_string()))?;

        let session_id = context.session_id().to_string();
        let mut guard = storage().lock().map_err(|_| ToolError::ProviderError("todo storage poisoned".to_string()))?;
        let todos = guard.entry(session_id).or_default();

        let result = match action {
            "add" => {
                let content = args.get("content").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("content is required for add".to_string()))?;
                let priority = args.get("priority").and_then(Value::as_str).unwrap_or("medium");
                let item = TodoItem { id: uuid::Uuid::new_v4().to_string(), content: content.to_string(), status: "pending".to_string(), priority: priority.to_string() };
                todos.push(item);
                summary(todos)
            }
            "list" => summary(todos),
            "start" | "done" | "cancel" => {
                let id = args.get("id").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest(format!("id is required for {action}")))?;
                let status = match action {
                    "start" => "in_progress",
                    "done" => "completed",
                    _ => "cancelled",
                };
                find_mut(todos, id)?.status = status.to_string();
                summary(todos)
            }
            "update" => {
                let id = args.get("id").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("id is required for update".to_string()))?;
                let item = find_mut(todos, id)?;
                if let Some(content) = args.get("content").and_then(Value::as_str) {
                    item.content = content.to_string();
                }
                if let Some(priority) = args.get("priority").and_then(Value::as_str) {
                    item.priority = priority.to_string();
                }
                summary(todos)
            }
            "delete" => {
                let id = args.get("id").and_then(Value::as_str).ok_or_else(|| ToolError::InvalidRequest("id is required for delete".to_string()))?;
                let before = todos.len();
                todos.retain(|t| t.id != id);
                if todos.len() == before {
                    return Err(ToolError::InvalidRequest(format!("no todo with id '{id}'")));
                }
                summary(todos)
            }
            "clear_done" => {
                todos.retain(|t| t.status != "completed");
                summary(todos)
            }
            other => return Err(ToolError::InvalidRequest(format!("unknown todo action '{other}'"))),
        };

        serde_json::to_string(&result).map_err(|e| ToolError::ProviderError(format!("serialize failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentToolContext;
    use tempfile::TempDir;

    fn context(session: &str, dir: &TempDir) -> AgentToolContext {
        AgentToolContext::basic(session.to_string(), Some(dir.path().to_path_buf()))
    }

    #[tokio::test]
    async fn add_then_list_reflects_the_new_item() {
        let dir = TempDir::new().unwrap();
        let ctx = context("todo-add-list", &dir);
        let tool = TodoTool::new();

        tool.call(json!({ "action": "add", "content": "write tests" }), &ctx).await.unwrap();
        let out = tool.call(json!({ "action": "list" }), &ctx).await.unwrap();
        assert!(out.contains("write tests"));
        assert!(out.contains("\"pending\":1"));
    }

    #[tokio::test]
    async fn lifecycle_transitions_update_status() {
        let dir = TempDir::new().unwrap();
        let ctx = context("todo-lifecycle", &dir);
        let tool = TodoTool::new();

        let added: Value = serde_json::from_str(&tool.call(json!({ "action": "add", "content": "ship" }), &ctx).await.unwrap()).unwrap();
        let id = added["todos"][0]["id"].as_str().unwrap().to_string();

        tool.call(json!({ "action": "start", "id": id }), &ctx).await.unwrap();
        let done_out = tool.call(json!({ "action": "done", "id": id }), &ctx).await.unwrap();
        assert!(done_out.contains("\"completed\":1"));

        let cleared = tool.call(json!({ "action": "clear_done" }), &ctx).await.unwrap();
        assert!(cleared.contains("\"total\":0"));
    }

    #[tokio::test]
    async fn unknown_action_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = context("todo-unknown", &dir);
        let err = TodoTool::new().call(json!({ "action": "nope" }), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("unknown todo action"));
    }

    #[tokio::test]
    async fn acting_on_a_missing_id_is_an_error() {
        let dir = TempDir::new().unwrap();
        let ctx = context("todo-missing-id", &dir);
        let err = TodoTool::new().call(json!({ "action": "done", "id": "nope" }), &ctx).await.unwrap_err();
        assert!(err.to_string().contains("no todo with id"));
    }
}
