use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionResponse {
    AllowOnce,
    AllowAlways,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub command: String,
    pub title: String,
    pub description: String,
    pub session_id: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
