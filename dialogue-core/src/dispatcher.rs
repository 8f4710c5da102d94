//! Protocol dispatcher (§4.8): one state machine per connection, decoding
//! wire messages, authenticating at handshake, running hooks, and
//! invoking the right component.

use crate::client::ConnectedClient;
use crate::errors::DialogueError;
use crate::hooks::{DialogueContext, Hooks};
use crate::ratelimit::RateLimiter;
use crate::registry::{ClientRegistry, RoomRegistry};
use crate::room::{RoomConfig, SyncHistoryOnJoin};
use crate::wire::{self, *};
use std::sync::Arc;

/// `Handshaking -> Authenticating -> Connected -> Disconnected`. The
/// dispatcher doesn't need to hold this as data: a connection that hasn't
/// produced a `ConnectedClient` yet is `Handshaking`/`Authenticating`, and
/// one that has is `Connected` until `disconnect` runs.
pub struct Dispatcher {
    pub rooms: Arc<RoomRegistry>,
    pub clients: Arc<ClientRegistry>,
    pub hooks: Hooks,
    pub history_rate_limiter: RateLimiter,
    /// §9 Open Question: forbid dynamically created wildcard-allow-list
    /// rooms in production.
    pub forbid_wildcard_rooms: bool,
}

impl Dispatcher {
    pub fn new(rooms: Arc<RoomRegistry>, clients: Arc<ClientRegistry>, hooks: Hooks) -> Self {
        Self {
            rooms,
            clients,
            hooks,
            history_rate_limiter: RateLimiter::history_default(),
            forbid_wildcard_rooms: false,
        }
    }

    fn ctx(&self) -> DialogueContext<'_> {
        DialogueContext {
            rooms: &self.rooms,
            clients: &self.clients,
        }
    }

    fn emit_error(&self, transport: &dyn wire::Transport, err: &DialogueError) {
        transport.emit(frame::ERROR, serde_json::to_value(ErrorFrame::from_error(err)).unwrap());
    }

    /// Handshake → Connected. `auth_payload` is the handshake's opaque
    /// `auth` object, the only input to `authenticate`.
    pub fn connect(
        &self,
        transport: Arc<dyn wire::Transport>,
        auth_payload: serde_json::Value,
    ) -> Option<Arc<ConnectedClient>> {
        let ctx = self.ctx();

        let (user_id, auth) = match &self.hooks.auth.authenticate {
            Some(hook) => match hook.authenticate(&ctx, &auth_payload) {
                Ok(auth) => (auth.sub.clone(), Some(auth)),
                Err(message) => {
                    tracing::warn!(error = %message, "handshake authentication failed");
                    self.emit_error(
                        transport.as_ref(),
                        &DialogueError::PermissionDenied(message),
                    );
                    transport.disconnect();
                    return None;
                }
            },
            // Legacy fallback (§9): prefer auth.userId, else auth.token,
            // else the transport's own connection id.
            None => {
                let user_id = auth_payload
                    .get("userId")
                    .and_then(|v| v.as_str())
                    .or_else(|| auth_payload.get("token").and_then(|v| v.as_str()))
                    .map(String::from)
                    .unwrap_or_else(|| transport.connection_id().to_string());
                (user_id, None)
            }
        };

        let client = ConnectedClient::new(user_id.clone(), auth, transport.clone());
        self.clients.connect(client.clone());

        if let Some(hook) = &self.hooks.socket.on_connect {
            hook(&ctx, transport.as_ref());
        }
        if let Some(hook) = &self.hooks.clients.on_connected {
            hook(&ctx, &client);
        }

        transport.emit(
            frame::CONNECTED,
            serde_json::to_value(ConnectedFrame {
                client_id: transport.connection_id().to_string(),
                user_id,
            })
            .unwrap(),
        );

        Some(client)
    }

    /// Dispatch one decoded inbound verb for a `Connected` client. Malformed
    /// payloads are silently dropped except for `getHistory`/`createRoom`,
    /// which return typed errors (§4.8).
    pub async fn dispatch(&self, client: &Arc<ConnectedClient>, verb: &str, payload: serde_json::Value) {
        match verb {
            verb::JOIN => self.handle_join(client, payload).await,
            verb::LEAVE => self.handle_leave(client, payload),
            verb::SUBSCRIBE => self.handle_subscribe(client, payload),
            verb::SUBSCRIBE_ALL => self.handle_subscribe_all(client, payload),
            verb::UNSUBSCRIBE => self.handle_unsubscribe(client, payload),
            verb::TRIGGER => self.handle_trigger(client, payload),
            verb::GET_HISTORY => self.handle_get_history(client, payload).await,
            verb::LIST_ROOMS => self.handle_list_rooms(client),
            verb::CREATE_ROOM => self.handle_create_room(client, payload),
            verb::DELETE_ROOM => self.handle_delete_room(client, payload),
            other => tracing::debug!(verb = other, "unknown inbound verb, dropped"),
        }
    }

    async fn handle_join(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let Ok(req) = serde_json::from_value::<JoinRequest>(payload) else {
            return;
        };
        let Some(room) = self.rooms.get(&req.room_id) else {
            self.emit_error(
                client.transport().as_ref(),
                &DialogueError::not_found(format!("room '{}' does not exist", req.room_id)),
            );
            return;
        };

        let ctx = self.ctx();
        if let Some(hook) = &self.hooks.clients.before_join {
            if let Err(message) = hook.before_join(&ctx, client, &req.room_id, &room) {
                self.emit_error(client.transport().as_ref(), &DialogueError::join_denied(message));
                return;
            }
        }

        let was_joined_before = client.has_joined(&req.room_id);
        client.join(&self.rooms, &req.room_id);
        if !client.has_joined(&req.room_id) {
            // capacity rejection already emitted ROOM_FULL inside client.join
            return;
        }

        if !was_joined_before {
            if let Some(hook) = &self.hooks.clients.on_joined {
                hook(&ctx, client);
            }
        }

        let sync = room.config().sync_history_on_join;
        let events = match sync {
            SyncHistoryOnJoin::None => return,
            SyncHistoryOnJoin::All => self.rooms.history_store().get_all(&req.room_id, None),
            SyncHistoryOnJoin::Limit(limit) => self.rooms.history_store().get_all(&req.room_id, Some(limit)),
        };

        client.transport().emit(
            frame::HISTORY,
            serde_json::to_value(HistoryFrame {
                room_id: req.room_id,
                events,
            })
            .unwrap(),
        );
    }

    fn handle_leave(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let Ok(req) = serde_json::from_value::<LeaveRequest>(payload) else {
            return;
        };
        client.leave(&self.rooms, &req.room_id);
        if let Some(hook) = &self.hooks.clients.on_left {
            hook(&self.ctx(), client);
        }
    }

    fn handle_subscribe(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let Ok(req) = serde_json::from_value::<SubscribeRequest>(payload) else {
            return;
        };
        client.subscribe(&req.room_id, &req.event_name);
    }

    fn handle_subscribe_all(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let Ok(req) = serde_json::from_value::<SubscribeAllRequest>(payload) else {
            return;
        };
        client.subscribe_all(&req.room_id);
    }

    fn handle_unsubscribe(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let Ok(req) = serde_json::from_value::<SubscribeRequest>(payload) else {
            return;
        };
        client.unsubscribe(&req.room_id, &req.event_name);
    }

    fn handle_trigger(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let Ok(req) = serde_json::from_value::<TriggerRequest>(payload) else {
            return;
        };
        let Some(room) = self.rooms.get(&req.room_id) else {
            self.emit_error(
                client.transport().as_ref(),
                &DialogueError::not_found(format!("room '{}' does not exist", req.room_id)),
            );
            return;
        };

        let ctx = self.ctx();
        if let Err(err) = room.trigger(&req.event, req.data, Some(client.user_id()), None, &self.hooks.events, &ctx) {
            self.emit_error(client.transport().as_ref(), &err);
        }
    }

    async fn handle_get_history(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let req = match serde_json::from_value::<GetHistoryRequest>(payload) {
            Ok(req) => req,
            Err(err) => {
                self.emit_error(
                    client.transport().as_ref(),
                    &DialogueError::InvalidRequest(format!("invalid getHistory payload: {err}")),
                );
                return;
            }
        };

        if !self.history_rate_limiter.is_allowed(client.connection_id()) {
            self.emit_error(
                client.transport().as_ref(),
                &DialogueError::RateLimit("too many history requests".into()),
            );
            return;
        }

        let Some(room) = self.rooms.get(&req.room_id) else {
            self.emit_error(
                client.transport().as_ref(),
                &DialogueError::not_found(format!("room '{}' does not exist", req.room_id)),
            );
            return;
        };

        let events = room.history(req.event_name.as_deref(), req.start, req.end).await;

        client.transport().emit(
            frame::HISTORY_RESPONSE,
            serde_json::to_value(HistoryResponseFrame {
                room_id: req.room_id,
                event_name: req.event_name,
                events,
                start: req.start,
                end: req.end,
            })
            .unwrap(),
        );
    }

    fn handle_list_rooms(&self, client: &Arc<ConnectedClient>) {
        let infos: Vec<RoomInfo> = self.rooms.all().iter().map(|r| r.info()).collect();
        client
            .transport()
            .emit(frame::ROOMS, serde_json::to_value(infos).unwrap());
    }

    /// Dynamic rooms created by a client get an empty (wildcard) allow-list
    /// (§3, §9 Open Question).
    fn handle_create_room(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let req = match serde_json::from_value::<CreateRoomRequest>(payload) {
            Ok(req) => req,
            Err(err) => {
                self.emit_error(
                    client.transport().as_ref(),
                    &DialogueError::InvalidRequest(format!("invalid createRoom payload: {err}")),
                );
                return;
            }
        };

        if self.forbid_wildcard_rooms {
            self.emit_error(
                client.transport().as_ref(),
                &DialogueError::InvalidRequest(
                    "dynamic wildcard-event rooms are disabled on this server".into(),
                ),
            );
            return;
        }

        let mut config = RoomConfig::open(req.id.clone(), req.name, client.user_id().to_string());
        config.description = req.description;
        config.max_size = req.max_size;

        match self.rooms.register(req.id, config) {
            Ok(room) => {
                let info = room.info();
                client
                    .transport()
                    .emit(frame::ROOM_CREATED, serde_json::to_value(&info).unwrap());
                client.transport().emit_to_group(
                    room.id(),
                    frame::ROOM_CREATED,
                    serde_json::to_value(&info).unwrap(),
                );
            }
            Err(err) => self.emit_error(client.transport().as_ref(), &err),
        }
    }

    /// Creator-only delete, enforced here (§4.8, §6).
    fn handle_delete_room(&self, client: &Arc<ConnectedClient>, payload: serde_json::Value) {
        let Ok(req) = serde_json::from_value::<DeleteRoomRequest>(payload) else {
            return;
        };
        let Some(room) = self.rooms.get(&req.room_id) else {
            self.emit_error(
                client.transport().as_ref(),
                &DialogueError::not_found(format!("room '{}' does not exist", req.room_id)),
            );
            return;
        };

        let is_creator = room.config().created_by_id.as_deref() == Some(client.user_id());
        if !is_creator {
            self.emit_error(
                client.transport().as_ref(),
                &DialogueError::PermissionDenied("only the room's creator may delete it".into()),
            );
            return;
        }

        self.rooms.unregister(&req.room_id);
        client.transport().emit(
            frame::ROOM_DELETED,
            serde_json::to_value(wire::RoomDeletedFrame {
                room_id: req.room_id,
            })
            .unwrap(),
        );
    }

    /// Disconnect flow (§4.8): `onDisconnected` fires, then
    /// `removeFromAllRooms`, then registry purge.
    pub fn disconnect(&self, connection_id: &str) {
        let ctx = self.ctx();
        if let Some(client) = self.clients.get(connection_id) {
            if let Some(hook) = &self.hooks.clients.on_disconnected {
                hook(&ctx, &client);
            }
            if let Some(hook) = &self.hooks.socket.on_disconnect {
                hook(&ctx, client.transport().as_ref());
            }
        }
        self.rooms.remove_from_all_rooms(connection_id);
        self.clients.disconnect(connection_id);
    }
}
