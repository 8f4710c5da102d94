//! Error kinds for the routing core, independent of the wire error codes
//! they map to (§7 of the design: ConfigError, NotFound, PermissionDenied,
//! ValidationFailure, CapacityExceeded, RateLimit).

use serde::{Deserialize, Serialize};

/// Wire-level error code, sent to clients inside a `dialogue:error` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireCode {
    RoomNotFound,
    RoomExists,
    RoomFull,
    JoinDenied,
    EventNotAllowed,
    ValidationFailed,
    PermissionDenied,
    InvalidRequest,
    RateLimited,
}

impl WireCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomExists => "ROOM_EXISTS",
            Self::RoomFull => "ROOM_FULL",
            Self::JoinDenied => "JOIN_DENIED",
            Self::EventNotAllowed => "EVENT_NOT_ALLOWED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::RateLimited => "RATE_LIMITED",
        }
    }
}

/// Errors raised synchronously on the expected-failure paths of the
/// routing core. These are returned to the direct caller and never panic.
/// Each variant carries its own `wire_code()` mapping directly — the
/// teacher's `AppError::Known { code, .. }` carries an explicit `ErrorCode`
/// rather than inferring one from the message, so two variants that could
/// otherwise share a message shape (room-not-found vs. event-not-allowed,
/// permission-denied vs. join-denied) are split instead of disambiguated
/// by sniffing the message text.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DialogueError {
    #[error("room configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    EventNotAllowed(String),

    #[error("{0}")]
    RoomExists(String),

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    JoinDenied(String),

    #[error("{0}")]
    ValidationFailure(String),

    #[error("{0}")]
    CapacityExceeded(String),

    #[error("{0}")]
    RateLimit(String),

    #[error("{0}")]
    InvalidRequest(String),
}

impl DialogueError {
    /// Map this error to the wire code a `dialogue:error` frame carries.
    pub fn wire_code(&self) -> WireCode {
        match self {
            Self::Config(_) => WireCode::InvalidRequest,
            Self::NotFound(_) => WireCode::RoomNotFound,
            Self::EventNotAllowed(_) => WireCode::EventNotAllowed,
            Self::RoomExists(_) => WireCode::RoomExists,
            Self::PermissionDenied(_) => WireCode::PermissionDenied,
            Self::JoinDenied(_) => WireCode::JoinDenied,
            Self::ValidationFailure(_) => WireCode::ValidationFailed,
            Self::CapacityExceeded(_) => WireCode::RoomFull,
            Self::RateLimit(_) => WireCode::RateLimited,
            Self::InvalidRequest(_) => WireCode::InvalidRequest,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn event_not_allowed(event: &str, room_id: &str) -> Self {
        Self::EventNotAllowed(format!(
            "Event '{event}' is not allowed in room '{room_id}'"
        ))
    }

    pub fn join_denied(message: impl Into<String>) -> Self {
        Self::JoinDenied(message.into())
    }
}

pub type DialogueResult<T> = Result<T, DialogueError>;
