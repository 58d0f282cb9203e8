//! Per-agent permission state: pending requests awaiting a response, and
//! a per-session set of types already approved "always" this run.

use crate::error::PermissionDenied;
use crate::request::{PermissionRequest, PermissionResponse};
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};

type RequestCallback = Arc<dyn Fn(&PermissionRequest) + Send + Sync>;

struct Waiting {
    request: PermissionRequest,
    sender: Option<oneshot::Sender<PermissionResponse>>,
}

#[derive(Default)]
pub struct Permission {
    pending: Mutex<HashMap<String, HashMap<String, Waiting>>>,
    approved: Mutex<HashMap<String, HashSet<String>>>,
    on_request: Mutex<Option<RequestCallback>>,
}

impl Permission {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_request_callback(&self, callback: RequestCallback) {
        *self.on_request.lock().await = Some(callback);
    }

    pub async fn is_approved(&self, session_id: &str, pattern: &str) -> bool {
        let approved = self.approved.lock().await;
        let Some(session_approved) = approved.get(session_id) else { return false };
        if session_approved.contains(pattern) {
            return true;
        }
        for approved_pattern in session_approved {
            if approved_pattern == "*" {
                return true;
            }
            if let Some(prefix) = approved_pattern.strip_suffix('*') {
                if pattern.starts_with(prefix) {
                    return true;
                }
            }
        }
        false
    }

    pub async fn ask(
        &self,
        session_id: &str,
        kind: &str,
        command: &str,
        title: &str,
        description: &str,
        metadata: Value,
    ) -> Result<(), PermissionDenied> {
        let pattern = format!("{kind}:{command}");
        if self.is_approved(session_id, kind).await || self.is_approved(session_id, &pattern).await {
            return Ok(());
        }

        let request = PermissionRequest {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.to_string(),
            command: command.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            session_id: session_id.to_string(),
            metadata,
            created_at: Utc::now(),
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.entry(session_id.to_string()).or_default().insert(request.id.clone(), Waiting { request: request.clone(), sender: Some(tx) });
        }

        if let Some(callback) = self.on_request.lock().await.clone() {
            callback(&request);
        }

        let response = rx.await;

        {
            let mut pending = self.pending.lock().await;
            if let Some(session_pending) = pending.get_mut(session_id) {
                session_pending.remove(&request.id);
            }
        }

        match response {
            Ok(PermissionResponse::Deny) => Err(PermissionDenied { request }),
            Ok(_) => Ok(()),
            Err(_) => Err(PermissionDenied { request }),
        }
    }

    pub async fn respond(&self, session_id: &str, request_id: &str, response: PermissionResponse) -> bool {
        let sender = {
            let mut pending = self.pending.lock().await;
            let Some(session_pending) = pending.get_mut(session_id) else { return false };
            let Some(waiting) = session_pending.get_mut(request_id) else { return false };
            waiting.sender.take()
        };

        let Some(sender) = sender else { return false };
        let _ = sender.send(response);

        if response == PermissionResponse::AllowAlways {
            let pending = self.pending.lock().await;
            if let Some(kind) = pending.get(session_id).and_then(|p| p.get(request_id)).map(|w| w.request.kind.clone()) {
                self.approved.lock().await.entry(session_id.to_string()).or_default().insert(kind);
            }
        }

        true
    }

    pub async fn pending(&self, session_id: Option<&str>) -> Vec<PermissionRequest> {
        let pending = self.pending.lock().await;
        let mut result: Vec<PermissionRequest> = match session_id {
            Some(sid) => pending.get(sid).map(|m| m.values().map(|w| w.request.clone()).collect()).unwrap_or_default(),
            None => pending.values().flat_map(|m| m.values().map(|w| w.request.clone())).collect(),
        };
        result.sort_by_key(|r| r.created_at);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_once_unblocks_ask_without_approving_future_calls() {
        let gate = Permission::new();
        let gate = Arc::new(gate);
        let g2 = gate.clone();

        let handle = tokio::spawn(async move { g2.ask("s1", "dangerous", "rm -rf /tmp/x", "rm -rf", "desc", Value::Null).await });

        tokio::task::yield_now().await;
        let pending = gate.pending(Some("s1")).await;
        assert_eq!(pending.len(), 1);
        let request_id = pending[0].id.clone();

        assert!(gate.respond("s1", &request_id, PermissionResponse::AllowOnce).await);
        assert!(handle.await.unwrap().is_ok());
        assert!(!gate.is_approved("s1", "dangerous").await);
    }

    #[tokio::test]
    async fn allow_always_approves_the_type_for_the_session() {
        let gate = Arc::new(Permission::new());
        let g2 = gate.clone();
        let handle = tokio::spawn(async move { g2.ask("s1", "git", "git push", "push", "desc", Value::Null).await });

        tokio::task::yield_now().await;
        let request_id = gate.pending(Some("s1")).await[0].id.clone();
        gate.respond("s1", &request_id, PermissionResponse::AllowAlways).await;
        assert!(handle.await.unwrap().is_ok());

        assert!(gate.is_approved("s1", "git").await);
        assert!(gate.ask("s1", "git", "git push --force", "push", "desc", Value::Null).await.is_ok());
    }

    #[tokio::test]
    async fn deny_surfaces_as_permission_denied() {
        let gate = Arc::new(Permission::new());
        let g2 = gate.clone();
        let handle = tokio::spawn(async move { g2.ask("s1", "dangerous", "rm -rf /", "rm -rf", "desc", Value::Null).await });

        tokio::task::yield_now().await;
        let request_id = gate.pending(Some("s1")).await[0].id.clone();
        gate.respond("s1", &request_id, PermissionResponse::Deny).await;
        assert!(handle.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn wildcard_approval_covers_any_pattern() {
        let gate = Permission::new();
        gate.approved.lock().await.entry("s1".to_string()).or_default().insert("*".to_string());
        assert!(gate.is_approved("s1", "anything:at-all").await);
    }
}
