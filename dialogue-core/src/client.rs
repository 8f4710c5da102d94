//! One transport connection: identity, auth, joined-room set, and
//! per-room subscription set (§4.6).

use crate::event::WILDCARD;
use crate::hooks::AuthData;
use crate::registry::RoomRegistry;
use crate::wire::{self, ErrorFrame, JoinedFrame, LeftFrame, Transport};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// `subscribed(c, r, e) := "*" in c.subs[r] OR e in c.subs[r]` (§4.6).
fn subscription_set_matches(subs: &HashSet<String>, event_name: &str) -> bool {
    subs.contains(WILDCARD) || subs.contains(event_name)
}

pub struct ConnectedClient {
    connection_id: String,
    user_id: String,
    auth: Option<AuthData>,
    meta: RwLock<serde_json::Value>,
    joined_rooms: RwLock<HashSet<String>>,
    subscriptions: RwLock<HashMap<String, HashSet<String>>>,
    transport: Arc<dyn Transport>,
}

impl ConnectedClient {
    pub fn new(user_id: impl Into<String>, auth: Option<AuthData>, transport: Arc<dyn Transport>) -> Arc<Self> {
        Arc::new(Self {
            connection_id: transport.connection_id().to_string(),
            user_id: user_id.into(),
            auth,
            meta: RwLock::new(serde_json::json!({})),
            joined_rooms: RwLock::new(HashSet::new()),
            subscriptions: RwLock::new(HashMap::new()),
            transport,
        })
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn auth(&self) -> Option<&AuthData> {
        self.auth.as_ref()
    }

    pub fn meta(&self) -> serde_json::Value {
        self.meta.read().clone()
    }

    pub fn set_meta(&self, meta: serde_json::Value) {
        *self.meta.write() = meta;
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn joined_rooms(&self) -> HashSet<String> {
        self.joined_rooms.read().clone()
    }

    pub fn has_joined(&self, room_id: &str) -> bool {
        self.joined_rooms.read().contains(room_id)
    }

    /// Used by the fan-out step of `Room::trigger` (§4.4 step 5).
    pub fn is_subscribed(&self, room_id: &str, event_name: &str) -> bool {
        self.subscriptions
            .read()
            .get(room_id)
            .map(|subs| subscription_set_matches(subs, event_name))
            .unwrap_or(false)
    }

    /// `join(roomId)` (§4.6).
    pub fn join(self: &Arc<Self>, registry: &RoomRegistry, room_id: &str) {
        let Some(room) = registry.get(room_id) else {
            tracing::warn!(room_id, connection_id = %self.connection_id, "join: room not found");
            return;
        };

        if self.has_joined(room_id) {
            self.transport.emit(
                wire::frame::JOINED,
                serde_json::to_value(JoinedFrame {
                    room_id: room_id.to_string(),
                    room_name: room.name().to_string(),
                })
                .unwrap(),
            );
            return;
        }

        if !registry.add_participant(room_id, self.clone()) {
            self.transport.emit(
                wire::frame::ERROR,
                serde_json::to_value(ErrorFrame {
                    code: "ROOM_FULL".to_string(),
                    message: format!("room '{room_id}' is full"),
                })
                .unwrap(),
            );
            return;
        }

        self.joined_rooms.write().insert(room_id.to_string());
        self.subscriptions
            .write()
            .insert(room_id.to_string(), HashSet::new());

        for name in room.default_subscriptions() {
            self.subscribe(room_id, &name);
        }

        self.transport.emit(
            wire::frame::JOINED,
            serde_json::to_value(JoinedFrame {
                room_id: room_id.to_string(),
                room_name: room.name().to_string(),
            })
            .unwrap(),
        );
    }

    /// `leave(roomId)` (§4.6).
    pub fn leave(self: &Arc<Self>, registry: &RoomRegistry, room_id: &str) {
        registry.remove_participant(room_id, &self.connection_id);
        self.joined_rooms.write().remove(room_id);
        self.subscriptions.write().remove(room_id);

        self.transport.emit(
            wire::frame::LEFT,
            serde_json::to_value(LeftFrame {
                room_id: room_id.to_string(),
            })
            .unwrap(),
        );
    }

    /// `subscribe(roomId, eventName)` — only effective if joined.
    pub fn subscribe(&self, room_id: &str, event_name: &str) {
        if !self.has_joined(room_id) {
            tracing::warn!(
                room_id,
                event_name,
                connection_id = %self.connection_id,
                "subscribe: client has not joined room"
            );
            return;
        }
        self.subscriptions
            .write()
            .entry(room_id.to_string())
            .or_default()
            .insert(event_name.to_string());
    }

    /// `subscribeAll(roomId)` = `subscribe(roomId, "*")`.
    pub fn subscribe_all(&self, room_id: &str) {
        self.subscribe(room_id, WILDCARD);
    }

    /// `unsubscribe(roomId, eventName)`.
    pub fn unsubscribe(&self, room_id: &str, event_name: &str) {
        if let Some(subs) = self.subscriptions.write().get_mut(room_id) {
            subs.remove(event_name);
        }
    }

    /// Test-only: mark a room as joined without going through the
    /// registry, for unit tests that exercise `Room` directly.
    #[cfg(test)]
    pub(crate) fn join_local_for_test(&self, room_id: &str) {
        self.joined_rooms.write().insert(room_id.to_string());
        self.subscriptions
            .write()
            .entry(room_id.to_string())
            .or_default();
    }

    /// `disconnect()` — remove from every room, clear local state.
    pub fn disconnect(self: &Arc<Self>, registry: &RoomRegistry) {
        registry.remove_from_all_rooms(&self.connection_id);
        self.joined_rooms.write().clear();
        self.subscriptions.write().clear();
        self.transport.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::RoomConfig;
    use crate::test_support::FakeTransport;

    fn make_registry_with_room(max_size: Option<usize>) -> RoomRegistry {
        let registry = RoomRegistry::new(Default::default());
        let mut config = RoomConfig::new("lobby", "Lobby");
        config.max_size = max_size;
        registry.register("lobby", config).unwrap();
        registry
    }

    #[test]
    fn join_is_idempotent_and_re_emits_ack() {
        let registry = make_registry_with_room(None);
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport.clone());

        client.join(&registry, "lobby");
        client.join(&registry, "lobby");

        let joined = transport.frames_named(wire::frame::JOINED);
        assert_eq!(joined.len(), 2);
    }

    #[test]
    fn join_missing_room_logs_and_does_not_emit() {
        let registry = make_registry_with_room(None);
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport.clone());

        client.join(&registry, "does-not-exist");
        assert!(transport.frames_named(wire::frame::JOINED).is_empty());
        assert!(transport.frames_named(wire::frame::ERROR).is_empty());
    }

    #[test]
    fn join_over_capacity_emits_room_full_to_caller_only() {
        let registry = make_registry_with_room(Some(1));
        let t1 = FakeTransport::new("conn-1");
        let c1 = ConnectedClient::new("user-1", None, t1.clone());
        let t2 = FakeTransport::new("conn-2");
        let c2 = ConnectedClient::new("user-2", None, t2.clone());

        c1.join(&registry, "lobby");
        c2.join(&registry, "lobby");

        assert!(t1.frames_named(wire::frame::ERROR).is_empty());
        let errors = t2.frames_named(wire::frame::ERROR);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["code"], "ROOM_FULL");
    }

    #[test]
    fn unsubscribe_before_joining_is_a_silent_no_op() {
        let _registry = make_registry_with_room(None);
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport);
        client.subscribe("lobby", "message");
        assert!(!client.is_subscribed("lobby", "message"));
    }

    #[test]
    fn disconnect_clears_joined_rooms_and_subscriptions() {
        let registry = make_registry_with_room(None);
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport);
        client.join(&registry, "lobby");
        client.subscribe("lobby", "message");
        assert!(client.has_joined("lobby"));

        client.disconnect(&registry);
        assert!(!client.has_joined("lobby"));
        assert!(!client.is_subscribed("lobby", "message"));
    }
}
