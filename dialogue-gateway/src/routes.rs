//! Additive REST surface (§6 of SPEC_FULL.md): health check, server-side
//! trigger, and a listing mirror of `dialogue:listRooms`. Grounded on
//! `broz-gateway/src/routes/health.rs` and `broz-messaging`'s REST routes
//! that sit alongside its socket layer.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dialogue_core::wire::RoomInfo;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum HealthStatus {
    Healthy,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: HealthStatus,
    service: &'static str,
    version: &'static str,
}

pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        service: "dialogue-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomInfo>> {
    let infos = state.dispatcher.rooms.all().iter().map(|r| r.info()).collect();
    Json(infos)
}

#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    pub event: String,
    pub data: serde_json::Value,
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    code: String,
    message: String,
}

/// Server-originated trigger: calls the same `Room::trigger` the socket
/// path calls, with `from` forced to `"system"`.
pub async fn trigger_room(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Json(body): Json<TriggerBody>,
) -> Response {
    let Some(room) = state.dispatcher.rooms.get(&room_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiError {
                code: "ROOM_NOT_FOUND".into(),
                message: format!("room '{room_id}' does not exist"),
            }),
        )
            .into_response();
    };

    let ctx = dialogue_core::DialogueContext {
        rooms: &state.dispatcher.rooms,
        clients: &state.dispatcher.clients,
    };

    match room.trigger(
        &body.event,
        body.data,
        None,
        body.meta,
        &state.dispatcher.hooks.events,
        &ctx,
    ) {
        Ok(recipient_count) => {
            Json(serde_json::json!({ "recipientCount": recipient_count })).into_response()
        }
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                code: err.wire_code().as_str().to_string(),
                message: err.message(),
            }),
        )
            .into_response(),
    }
}
