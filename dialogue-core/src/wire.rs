//! Wire protocol constants and payload shapes (§6).
//!
//! The core never serializes frames onto a socket itself — that is the
//! `Transport`'s job — but it owns the frame names, verb names, and
//! payload shapes so a transport adapter (`dialogue-gateway`) has nothing
//! left to invent.

use crate::message::EventMessage;
use serde::{Deserialize, Serialize};

/// Obligations the transport layer must satisfy, specified only by this
/// interface (§1): framed JSON messages, per-connection identity, and the
/// ability to address either a single connection or a named group of
/// connections (used for room broadcast and bulk lifecycle notices, §4.5).
pub trait Transport: Send + Sync {
    fn connection_id(&self) -> &str;

    /// Emit a named frame with a JSON payload to this connection only.
    fn emit(&self, frame: &str, payload: serde_json::Value);

    /// Emit a named frame to every connection currently in `group`
    /// (room-keyed bulk notification, §4.5).
    fn emit_to_group(&self, group: &str, frame: &str, payload: serde_json::Value);

    /// Have this connection join a transport-level group (§4.5:
    /// "used by the registry for bulk notifications only").
    fn join_group(&self, group: &str);

    fn leave_group(&self, group: &str);

    /// Force-close this connection.
    fn disconnect(&self);
}

/// S→C frame names.
pub mod frame {
    pub const CONNECTED: &str = "dialogue:connected";
    pub const JOINED: &str = "dialogue:joined";
    pub const LEFT: &str = "dialogue:left";
    pub const EVENT: &str = "dialogue:event";
    pub const HISTORY: &str = "dialogue:history";
    pub const HISTORY_RESPONSE: &str = "dialogue:historyResponse";
    pub const ROOMS: &str = "dialogue:rooms";
    pub const ROOM_CREATED: &str = "dialogue:roomCreated";
    pub const ROOM_DELETED: &str = "dialogue:roomDeleted";
    pub const ERROR: &str = "dialogue:error";
}

/// C→S verb names.
pub mod verb {
    pub const JOIN: &str = "dialogue:join";
    pub const LEAVE: &str = "dialogue:leave";
    pub const SUBSCRIBE: &str = "dialogue:subscribe";
    pub const SUBSCRIBE_ALL: &str = "dialogue:subscribeAll";
    pub const UNSUBSCRIBE: &str = "dialogue:unsubscribe";
    pub const TRIGGER: &str = "dialogue:trigger";
    pub const GET_HISTORY: &str = "dialogue:getHistory";
    pub const LIST_ROOMS: &str = "dialogue:listRooms";
    pub const CREATE_ROOM: &str = "dialogue:createRoom";
    pub const DELETE_ROOM: &str = "dialogue:deleteRoom";
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub code: String,
    pub message: String,
}

impl ErrorFrame {
    pub fn from_error(err: &crate::errors::DialogueError) -> Self {
        Self {
            code: err.wire_code().as_str().to_string(),
            message: err.message(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedFrame {
    pub client_id: String,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedFrame {
    pub room_id: String,
    pub room_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeftFrame {
    pub room_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFrame {
    pub room_id: String,
    pub events: Vec<EventMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponseFrame {
    pub room_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub events: Vec<EventMessage>,
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDeletedFrame {
    pub room_id: String,
}

/// `dialogue:join` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: String,
}

/// `dialogue:leave` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub room_id: String,
}

/// `dialogue:subscribe` / `dialogue:unsubscribe` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub room_id: String,
    pub event_name: String,
}

/// `dialogue:subscribeAll` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeAllRequest {
    pub room_id: String,
}

/// `dialogue:trigger` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub room_id: String,
    pub event: String,
    pub data: serde_json::Value,
}

/// `dialogue:getHistory` payload. Defaults: `start=0, end=50`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetHistoryRequest {
    pub room_id: String,
    pub event_name: Option<String>,
    #[serde(default = "default_history_start")]
    pub start: i64,
    #[serde(default = "default_history_end")]
    pub end: i64,
}

fn default_history_start() -> i64 {
    0
}
fn default_history_end() -> i64 {
    50
}

/// `dialogue:createRoom` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub max_size: Option<usize>,
}

/// `dialogue:deleteRoom` payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRoomRequest {
    pub room_id: String,
}
