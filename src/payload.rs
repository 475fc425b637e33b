//! Canonical session payload.
//!
//! The shape shared with the external upload collaborator: everything a
//! remote consumer needs to mirror a session without reading our tables.
//! Messages are included only when full content sharing is enabled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionPayload {
    pub session_id: String,
    pub project_name: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub total_messages: i64,
    pub total_tokens_in: i64,
    pub total_tokens_out: i64,
    pub model: Option<String>,
    pub tools: BTreeMap<String, ToolStats>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<MessagePayload>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolStats {
    pub count: i64,
    pub success: i64,
    pub errors: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub sequence: i64,
    pub timestamp: Option<String>,
    pub role: String,
    pub content: String,
}
