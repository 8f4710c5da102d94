//! Hook groups (§6 "Hook contracts", DESIGN NOTES §9: "express each hook
//! group as a small struct of optional function values").
//!
//! Hooks on the trigger hot path (`before_each`, `after_each`,
//! `before_join`) are plain synchronous trait objects: the pipeline must
//! not suspend across them (§5). Lifecycle notifications
//! (`on_connected`, `on_disconnected`, `on_joined`, `on_left`,
//! `on_triggered`) are fire-and-forget closures; if a hook needs to do
//! async work it spawns its own task rather than blocking the caller.

use crate::client::ConnectedClient;
use crate::message::EventMessage;
use crate::registry::{ClientRegistry, RoomRegistry};
use crate::room::Room;
use crate::wire::Transport;
use std::sync::Arc;

/// Resolved authentication result. `sub` becomes the client's `userId`.
#[derive(Debug, Clone)]
pub struct AuthData {
    pub sub: String,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub claims: serde_json::Value,
}

/// Read-only snapshot view passed to every hook (§6's `ctx`).
pub struct DialogueContext<'a> {
    pub rooms: &'a RoomRegistry,
    pub clients: &'a ClientRegistry,
}

/// `authenticate(ctx, rawSocket, authData) -> Ok(AuthData) | Err(string)`.
/// `rawSocket` is transport-owned and lives at the dispatcher/transport
/// layer (§1 treats the transport as an external collaborator); the core
/// hook sees only the handshake's opaque auth payload.
pub trait AuthenticateHook: Send + Sync {
    fn authenticate(
        &self,
        ctx: &DialogueContext<'_>,
        auth_payload: &serde_json::Value,
    ) -> Result<AuthData, String>;
}

/// `clients.beforeJoin(ctx, client, roomId, room) -> Ok() | Err(string)`.
pub trait BeforeJoinHook: Send + Sync {
    fn before_join(
        &self,
        ctx: &DialogueContext<'_>,
        client: &ConnectedClient,
        room_id: &str,
        room: &Room,
    ) -> Result<(), String>;
}

/// `events.beforeEach(ctx, roomId, msg, from) -> Ok(msg') | Err(string)`.
/// May replace the message but must only mutate `data`/`meta`.
pub trait BeforeEachHook: Send + Sync {
    fn before_each(
        &self,
        ctx: &DialogueContext<'_>,
        room_id: &str,
        msg: EventMessage,
        from: &str,
    ) -> Result<EventMessage, String>;
}

/// `events.afterEach(ctx, roomId, msg, recipientCount)`.
pub trait AfterEachHook: Send + Sync {
    fn after_each(
        &self,
        ctx: &DialogueContext<'_>,
        room_id: &str,
        msg: &EventMessage,
        recipient_count: usize,
    );
}

type ClientLifecycleFn = dyn Fn(&DialogueContext<'_>, &ConnectedClient) + Send + Sync;
type TriggeredFn = dyn Fn(&str, &EventMessage) + Send + Sync;
type SocketLifecycleFn = dyn Fn(&DialogueContext<'_>, &dyn Transport) + Send + Sync;

/// `socket.{onConnect,onDisconnect}(ctx, rawSocket)`, fire-and-forget.
/// `rawSocket` is the transport handle for the connection — the one piece
/// of transport-owned state the core exposes to hooks (§1 treats the
/// transport as an external collaborator).
#[derive(Clone, Default)]
pub struct SocketHooks {
    pub on_connect: Option<Arc<SocketLifecycleFn>>,
    pub on_disconnect: Option<Arc<SocketLifecycleFn>>,
}

/// `clients.{onConnected,onDisconnected,onJoined,onLeft}`, all
/// fire-and-forget.
#[derive(Clone, Default)]
pub struct ClientHooks {
    pub before_join: Option<Arc<dyn BeforeJoinHook>>,
    pub on_connected: Option<Arc<ClientLifecycleFn>>,
    pub on_disconnected: Option<Arc<ClientLifecycleFn>>,
    pub on_joined: Option<Arc<ClientLifecycleFn>>,
    pub on_left: Option<Arc<ClientLifecycleFn>>,
}

/// `events.{beforeEach,afterEach,onTriggered}`.
#[derive(Clone, Default)]
pub struct EventHooks {
    pub before_each: Option<Arc<dyn BeforeEachHook>>,
    pub after_each: Option<Arc<dyn AfterEachHook>>,
    pub on_triggered: Option<Arc<TriggeredFn>>,
}

/// `rooms.{onCreated,onDeleted}` — unlike the other hook groups these are
/// not listed with a `ctx` parameter in the hook contract table (§6); they
/// fire directly off room lifecycle events.
#[derive(Clone, Default)]
pub struct RoomHooks {
    pub on_created: Option<Arc<dyn Fn(&Room) + Send + Sync>>,
    pub on_deleted: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

#[derive(Clone, Default)]
pub struct AuthHooks {
    pub authenticate: Option<Arc<dyn AuthenticateHook>>,
}

/// The full set of hooks a dispatcher/registry installs at startup.
#[derive(Clone, Default)]
pub struct Hooks {
    pub auth: AuthHooks,
    pub socket: SocketHooks,
    pub clients: ClientHooks,
    pub events: EventHooks,
    pub rooms: RoomHooks,
}
