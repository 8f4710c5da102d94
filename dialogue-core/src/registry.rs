//! Room registry (§4.5) and client registry (§4.7).

use crate::client::ConnectedClient;
use crate::errors::{DialogueError, DialogueResult};
use crate::history::HistoryStore;
use crate::hooks::RoomHooks;
use crate::room::{Room, RoomConfig};
use crate::wire::{self, RoomDeletedFrame};
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use std::sync::Arc;

/// Owns every `Room`, the shared history store, and room lifecycle hooks.
pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    history: Arc<HistoryStore>,
    hooks: RoomHooks,
}

impl RoomRegistry {
    pub fn new(hooks: RoomHooks) -> Self {
        Self {
            rooms: DashMap::new(),
            history: Arc::new(HistoryStore::new()),
            hooks,
        }
    }

    pub fn with_history_store(hooks: RoomHooks, history: Arc<HistoryStore>) -> Self {
        Self {
            rooms: DashMap::new(),
            history,
            hooks,
        }
    }

    pub fn history_store(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// `register(id, config)`.
    pub fn register(&self, id: impl Into<String>, config: RoomConfig) -> DialogueResult<Arc<Room>> {
        let id = id.into();
        config.validate()?;
        if self.rooms.contains_key(&id) {
            return Err(DialogueError::RoomExists(format!(
                "room '{id}' already exists"
            )));
        }

        let room = Arc::new(Room::new(id.clone(), config, self.history.clone()));
        self.rooms.insert(id, room.clone());

        if let Some(hook) = &self.hooks.on_created {
            hook(&room);
        }

        Ok(room)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|r| r.clone())
    }

    pub fn all(&self) -> Vec<Arc<Room>> {
        self.rooms.iter().map(|e| e.value().clone()).collect()
    }

    /// `addParticipant(roomId, client) -> bool`.
    pub fn add_participant(&self, room_id: &str, client: Arc<ConnectedClient>) -> bool {
        let Some(room) = self.get(room_id) else {
            return false;
        };
        if !room.insert_participant(client.clone()) {
            return false;
        }
        client.transport().join_group(room_id);
        true
    }

    /// `removeParticipant(roomId, connectionId)`.
    pub fn remove_participant(&self, room_id: &str, connection_id: &str) {
        if let Some(room) = self.get(room_id) {
            room.remove_participant(connection_id);
        }
    }

    /// `removeFromAllRooms(connectionId)`.
    pub fn remove_from_all_rooms(&self, connection_id: &str) {
        for room in self.all() {
            room.remove_participant(connection_id);
        }
    }

    /// `unregister(id) -> bool`.
    pub fn unregister(&self, id: &str) -> bool {
        let Some((_, room)) = self.rooms.remove(id) else {
            return false;
        };

        for participant in room.participants() {
            participant.transport().leave_group(id);
            participant.transport().emit(
                wire::frame::ROOM_DELETED,
                serde_json::to_value(RoomDeletedFrame {
                    room_id: id.to_string(),
                })
                .unwrap(),
            );
        }

        self.history.clear_room(id);

        if let Some(hook) = &self.hooks.on_deleted {
            hook(id);
        }

        true
    }
}

/// Forward `connectionId -> client` plus reverse `userId -> connectionIds`
/// index, kept strictly in sync (§4.7, Invariant 5 in §8).
pub struct ClientRegistry {
    forward: DashMap<String, Arc<ConnectedClient>>,
    reverse: DashMap<String, DashSet<String>>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            forward: DashMap::new(),
            reverse: DashMap::new(),
        }
    }

    pub fn connect(&self, client: Arc<ConnectedClient>) {
        let connection_id = client.connection_id().to_string();
        let user_id = client.user_id().to_string();
        self.forward.insert(connection_id.clone(), client);
        self.reverse.entry(user_id).or_default().insert(connection_id);
    }

    pub fn disconnect(&self, connection_id: &str) -> Option<Arc<ConnectedClient>> {
        let (_, client) = self.forward.remove(connection_id)?;
        if let Some(conns) = self.reverse.get(client.user_id()) {
            conns.remove(connection_id);
        }
        Some(client)
    }

    pub fn get(&self, connection_id: &str) -> Option<Arc<ConnectedClient>> {
        self.forward.get(connection_id).map(|c| c.clone())
    }

    /// `clientsByUserId(uid)` — resolves through the forward map, skipping
    /// stale reverse-index entries.
    pub fn clients_by_user_id(&self, user_id: &str) -> Vec<Arc<ConnectedClient>> {
        let Some(conns) = self.reverse.get(user_id) else {
            return Vec::new();
        };
        conns
            .iter()
            .filter_map(|conn_id| self.forward.get(conn_id.key()).map(|c| c.clone()))
            .collect()
    }

    /// `clientRooms(uid)` — union of `joinedRooms` across the user's
    /// connections.
    pub fn client_rooms(&self, user_id: &str) -> HashSet<String> {
        self.clients_by_user_id(user_id)
            .iter()
            .flat_map(|c| c.joined_rooms())
            .collect()
    }

    /// `isInRoom(uid, rid)`.
    pub fn is_in_room(&self, user_id: &str, room_id: &str) -> bool {
        self.clients_by_user_id(user_id)
            .iter()
            .any(|c| c.has_joined(room_id))
    }

    /// `leaveAll(uid, callback?)` — invokes `callback(roomId)` before
    /// mutation, then forces every connection of the user out of that room.
    pub fn leave_all(&self, user_id: &str, rooms: &RoomRegistry, callback: Option<&dyn Fn(&str)>) {
        let room_ids = self.client_rooms(user_id);
        let clients = self.clients_by_user_id(user_id);
        for room_id in room_ids {
            if let Some(cb) = callback {
                cb(&room_id);
            }
            for client in &clients {
                client.leave(rooms, &room_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeTransport;

    #[test]
    fn register_rejects_duplicate_ids() {
        let registry = RoomRegistry::new(RoomHooks::default());
        registry.register("lobby", RoomConfig::new("lobby", "Lobby")).unwrap();
        let err = registry
            .register("lobby", RoomConfig::new("lobby", "Lobby"))
            .unwrap_err();
        assert_eq!(err.wire_code(), crate::errors::WireCode::RoomExists);
    }

    #[test]
    fn unregister_evicts_participants_and_clears_history() {
        let registry = RoomRegistry::new(RoomHooks::default());
        registry.register("lobby", RoomConfig::new("lobby", "Lobby")).unwrap();
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport.clone());
        client.join(&registry, "lobby");

        assert!(registry.unregister("lobby"));
        assert!(registry.get("lobby").is_none());
        let deleted = transport.frames_named(wire::frame::ROOM_DELETED);
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0]["roomId"], "lobby");
    }

    #[test]
    fn unregister_missing_room_returns_false() {
        let registry = RoomRegistry::new(RoomHooks::default());
        assert!(!registry.unregister("ghost"));
    }

    #[test]
    fn client_registry_keeps_forward_and_reverse_in_sync() {
        let registry = ClientRegistry::new();
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport);
        registry.connect(client.clone());

        assert_eq!(registry.clients_by_user_id("user-1").len(), 1);
        registry.disconnect("conn-1");
        assert!(registry.clients_by_user_id("user-1").is_empty());
        assert!(registry.get("conn-1").is_none());
    }

    #[test]
    fn clients_by_user_id_skips_stale_reverse_entries() {
        let registry = ClientRegistry::new();
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport);
        registry.connect(client);
        registry.forward.remove("conn-1");

        assert!(registry.clients_by_user_id("user-1").is_empty());
    }

    #[test]
    fn leave_all_invokes_callback_before_mutation_and_clears_rooms() {
        let rooms = RoomRegistry::new(RoomHooks::default());
        rooms.register("lobby", RoomConfig::new("lobby", "Lobby")).unwrap();
        let clients = ClientRegistry::new();
        let transport = FakeTransport::new("conn-1");
        let client = ConnectedClient::new("user-1", None, transport);
        client.join(&rooms, "lobby");
        clients.connect(client.clone());

        let seen = std::sync::Mutex::new(Vec::new());
        let callback = |room_id: &str| seen.lock().unwrap().push(room_id.to_string());
        clients.leave_all("user-1", &rooms, Some(&callback));

        assert_eq!(seen.into_inner().unwrap(), vec!["lobby".to_string()]);
        assert!(!client.has_joined("lobby"));
    }
}
