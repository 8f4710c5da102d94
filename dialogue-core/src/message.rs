//! The wire envelope every event carries (§3 "EventMessage").

use serde::{Deserialize, Serialize};

/// `from` used for server-originated events with no explicit sender.
pub const SYSTEM_SENDER: &str = "system";

/// Fixed-shape envelope. Only `data` and `meta` are caller-defined; the
/// other four fields are an immutable contract the wire protocol depends
/// on (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub event: String,
    pub room_id: String,
    pub data: serde_json::Value,
    pub from: String,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl EventMessage {
    pub fn new(
        event: impl Into<String>,
        room_id: impl Into<String>,
        data: serde_json::Value,
        from: Option<String>,
        meta: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event: event.into(),
            room_id: room_id.into(),
            data,
            from: from.unwrap_or_else(|| SYSTEM_SENDER.to_string()),
            timestamp: chrono::Utc::now().timestamp_millis(),
            meta,
        }
    }
}
