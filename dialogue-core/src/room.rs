//! One room's configuration, participants, server-side handlers, and the
//! trigger pipeline (§4.4).

use crate::client::ConnectedClient;
use crate::errors::{DialogueError, DialogueResult};
use crate::event::{is_event_allowed, validate_event_data, EventDefinition, WILDCARD};
use crate::history::HistoryStore;
use crate::hooks::{DialogueContext, EventHooks};
use crate::message::EventMessage;
use crate::wire;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// `syncHistoryOnJoin`: `none`, `all`, or a positive limit.
#[derive(Debug, Clone, Copy, Default)]
pub enum SyncHistoryOnJoin {
    #[default]
    None,
    All,
    Limit(usize),
}

/// Static room configuration (§3 "RoomConfig").
#[derive(Clone)]
pub struct RoomConfig {
    pub name: String,
    pub description: Option<String>,
    pub max_size: Option<usize>,
    /// Empty means "wildcard: all events allowed" (§3).
    pub events: Vec<EventDefinition>,
    pub default_subscriptions: HashSet<String>,
    pub created_by_id: Option<String>,
    pub sync_history_on_join: SyncHistoryOnJoin,
}

impl RoomConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let _ = id; // id lives on the Room, kept here for call-site symmetry with `register(id, config)`.
        Self {
            name: name.into(),
            description: None,
            max_size: None,
            events: Vec::new(),
            default_subscriptions: HashSet::new(),
            created_by_id: None,
            sync_history_on_join: SyncHistoryOnJoin::None,
        }
    }

    /// A dynamically created room has an empty (wildcard) allow-list
    /// (§9 Open Question — kept intentional, see DESIGN.md).
    pub fn open(id: impl Into<String>, name: impl Into<String>, created_by_id: String) -> Self {
        let mut config = Self::new(id, name);
        config.created_by_id = Some(created_by_id);
        config
    }

    pub fn validate(&self) -> DialogueResult<()> {
        if let Some(max) = self.max_size {
            if max == 0 {
                return Err(DialogueError::Config("maxSize must be positive".into()));
            }
        }
        for def in &self.events {
            if let Some(policy) = def.history() {
                if policy.limit == 0 {
                    return Err(DialogueError::Config(format!(
                        "history limit for event '{}' must be >= 1",
                        def.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

type Handler = Arc<dyn Fn(&EventMessage) -> Result<(), String> + Send + Sync>;

#[derive(Default)]
struct HandlerRegistry {
    handlers: DashMap<String, DashMap<u64, Handler>>,
    next_id: AtomicU64,
}

pub struct Room {
    id: String,
    config: RoomConfig,
    participants: DashMap<String, Arc<ConnectedClient>>,
    handlers: HandlerRegistry,
    history: Arc<HistoryStore>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("participants", &self.participants.len())
            .finish()
    }
}

impl Room {
    pub fn new(id: impl Into<String>, config: RoomConfig, history: Arc<HistoryStore>) -> Self {
        Self {
            id: id.into(),
            config,
            participants: DashMap::new(),
            handlers: HandlerRegistry::default(),
            history,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn default_subscriptions(&self) -> Vec<String> {
        if self.config.default_subscriptions.contains(WILDCARD) {
            vec![WILDCARD.to_string()]
        } else {
            self.config.default_subscriptions.iter().cloned().collect()
        }
    }

    pub fn size(&self) -> usize {
        self.participants.len()
    }

    pub fn is_full(&self) -> bool {
        match self.config.max_size {
            Some(max) => self.participants.len() >= max,
            None => false,
        }
    }

    pub fn participants(&self) -> Vec<Arc<ConnectedClient>> {
        self.participants.iter().map(|e| e.value().clone()).collect()
    }

    pub fn info(&self) -> wire::RoomInfo {
        wire::RoomInfo {
            id: self.id.clone(),
            name: self.config.name.clone(),
            description: self.config.description.clone(),
            size: self.size(),
            max_size: self.config.max_size,
            created_by_id: self.config.created_by_id.clone(),
        }
    }

    pub(crate) fn insert_participant(&self, client: Arc<ConnectedClient>) -> bool {
        if self.is_full() {
            return false;
        }
        self.participants.insert(client.connection_id().to_string(), client);
        true
    }

    pub(crate) fn remove_participant(&self, connection_id: &str) {
        self.participants.remove(connection_id);
    }

    fn matching_definition(&self, event_name: &str) -> EventDefinition {
        self.config
            .events
            .iter()
            .find(|def| def.name() == event_name)
            .cloned()
            .unwrap_or_else(|| EventDefinition::bare(event_name))
    }

    /// `trigger(event, data, from?, meta?)` (§4.4). Fully synchronous up
    /// through the `afterEach` step; handler/onTriggered dispatch happens
    /// after this returns (§5).
    pub fn trigger(
        &self,
        event_name: &str,
        data: serde_json::Value,
        from: Option<&str>,
        meta: Option<serde_json::Value>,
        hooks: &EventHooks,
        ctx: &DialogueContext<'_>,
    ) -> DialogueResult<usize> {
        // 1. Allow-list check.
        if !is_event_allowed(event_name, &self.config.events) {
            return Err(DialogueError::event_not_allowed(event_name, &self.id));
        }

        // 2. Validate.
        let def = self.matching_definition(event_name);
        let data = validate_event_data(&def, data)?;

        // 3. Construct.
        let mut msg = EventMessage::new(event_name, &self.id, data, from.map(String::from), meta);

        // 4. beforeEach.
        if let Some(hook) = &hooks.before_each {
            let from = msg.from.clone();
            msg = hook
                .before_each(ctx, &self.id, msg, &from)
                .map_err(DialogueError::ValidationFailure)?;
        }

        // 5. Fan-out.
        let mut recipient_count = 0usize;
        for participant in self.participants.iter() {
            if participant.value().is_subscribed(&self.id, event_name) {
                participant.value().transport().emit(wire::frame::EVENT, serde_json::to_value(&msg).unwrap());
                recipient_count += 1;
            }
        }

        // 6. Post-broadcast.
        if let Some(policy) = def.history() {
            if policy.enabled {
                self.history.push(&self.id, event_name, msg.clone(), policy.limit);
            }
        }

        if let Some(event_handlers) = self.handlers.handlers.get(event_name) {
            for handler in event_handlers.iter() {
                let handler = handler.value().clone();
                let msg = msg.clone();
                let event_name = event_name.to_string();
                tokio::spawn(async move {
                    if let Err(err) = handler(&msg) {
                        tracing::error!(event = %event_name, error = %err, "server handler failed");
                    }
                });
            }
        }

        if let Some(on_triggered) = &hooks.on_triggered {
            on_triggered(&self.id, &msg);
        }

        // 7. afterEach.
        if let Some(hook) = &hooks.after_each {
            hook.after_each(ctx, &self.id, &msg, recipient_count);
        }

        Ok(recipient_count)
    }

    /// `on(event, handler) -> unsubscribe`.
    pub fn on(&self, event_name: impl Into<String>, handler: Handler) -> u64 {
        let id = self.handlers.next_id.fetch_add(1, Ordering::SeqCst);
        self.handlers
            .handlers
            .entry(event_name.into())
            .or_default()
            .insert(id, handler);
        id
    }

    pub fn off(&self, event_name: &str, handler_id: u64) {
        if let Some(set) = self.handlers.handlers.get(event_name) {
            set.remove(&handler_id);
            if set.is_empty() {
                drop(set);
                self.handlers.handlers.remove(event_name);
            }
        }
    }

    /// Paginated read with external fallback (§4.3). `event_name: None` is
    /// the room-wide `getHistory` form (§6: `eventName?`) — aggregated
    /// across every event type instead of keyed lookup, since history
    /// buffers are never stored under a wildcard key.
    pub async fn history(&self, event_name: Option<&str>, start: i64, end: i64) -> Vec<EventMessage> {
        match event_name {
            Some(name) => self.history.history(&self.id, name, start, end).await,
            None => self.history.get_room(&self.id, start, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClientRegistry, RoomRegistry};
    use crate::test_support::FakeTransport;

    fn ctx<'a>(rooms: &'a RoomRegistry, clients: &'a ClientRegistry) -> DialogueContext<'a> {
        DialogueContext { rooms, clients }
    }

    #[test]
    fn trigger_rejects_disallowed_events() {
        let mut config = RoomConfig::new("chat", "Chat");
        config.events = vec![EventDefinition::bare("message")];
        let room = Room::new("chat", config, Arc::new(HistoryStore::new()));
        let rooms = RoomRegistry::new(Default::default());
        let clients = ClientRegistry::new();
        let hooks = EventHooks::default();

        let err = room
            .trigger("knock", serde_json::json!({}), None, None, &hooks, &ctx(&rooms, &clients))
            .unwrap_err();
        assert_eq!(err.wire_code(), crate::errors::WireCode::EventNotAllowed);
    }

    #[test]
    fn subscription_filter_only_delivers_to_subscribed_participants() {
        let mut config = RoomConfig::new("chat", "Chat");
        config.events = vec![EventDefinition::bare("message"), EventDefinition::bare("typing")];
        let room = Room::new("chat", config, Arc::new(HistoryStore::new()));

        let ta = FakeTransport::new("a");
        let a = ConnectedClient::new("alice", None, ta.clone());
        let tb = FakeTransport::new("b");
        let b = ConnectedClient::new("bob", None, tb.clone());

        room.insert_participant(a.clone());
        room.insert_participant(b.clone());
        a.join_local_for_test("chat");
        b.join_local_for_test("chat");
        a.subscribe("chat", "message");
        b.subscribe("chat", "typing");

        let rooms = RoomRegistry::new(Default::default());
        let clients = ClientRegistry::new();
        let hooks = EventHooks::default();

        let count = room
            .trigger(
                "message",
                serde_json::json!({"text": "hi"}),
                Some("alice"),
                None,
                &hooks,
                &ctx(&rooms, &clients),
            )
            .unwrap();

        assert_eq!(count, 1);
        assert_eq!(ta.frames_named(wire::frame::EVENT).len(), 1);
        assert!(tb.frames_named(wire::frame::EVENT).is_empty());
    }

    struct CensorBadWords;
    impl crate::hooks::BeforeEachHook for CensorBadWords {
        fn before_each(
            &self,
            _ctx: &DialogueContext<'_>,
            _room_id: &str,
            mut msg: EventMessage,
            _from: &str,
        ) -> Result<EventMessage, String> {
            if msg.data["text"].as_str().unwrap_or_default().contains("bad") {
                msg.data["text"] = serde_json::json!("[censored]");
            }
            Ok(msg)
        }
    }

    #[test]
    fn before_each_transforms_data_before_fanout_and_history() {
        let mut config = RoomConfig::new("chat", "Chat");
        config.events = vec![EventDefinition::new(
            "message",
            crate::event::EventDefinitionOpts {
                validator: None,
                history: Some(crate::event::HistoryPolicy::new(10)),
            },
        )];
        let history = Arc::new(HistoryStore::new());
        let room = Room::new("chat", config, history.clone());

        let ta = FakeTransport::new("a");
        let a = ConnectedClient::new("alice", None, ta.clone());
        room.insert_participant(a.clone());
        a.join_local_for_test("chat");
        a.subscribe_all("chat");

        let rooms = RoomRegistry::new(Default::default());
        let clients = ClientRegistry::new();
        let mut hooks = EventHooks::default();
        hooks.before_each = Some(Arc::new(CensorBadWords));

        room.trigger(
            "message",
            serde_json::json!({"text": "bad word"}),
            Some("alice"),
            None,
            &hooks,
            &ctx(&rooms, &clients),
        )
        .unwrap();

        let delivered = ta.frames_named(wire::frame::EVENT);
        assert_eq!(delivered[0]["data"]["text"], "[censored]");
        let stored = history.get("chat", "message", 0, 1);
        assert_eq!(stored[0].data["text"], "[censored]");
    }

    #[test]
    fn history_eviction_trims_to_configured_limit() {
        let mut config = RoomConfig::new("chat", "Chat");
        config.events = vec![EventDefinition::new(
            "message",
            crate::event::EventDefinitionOpts {
                validator: None,
                history: Some(crate::event::HistoryPolicy::new(3)),
            },
        )];
        let history = Arc::new(HistoryStore::new());
        let room = Room::new("chat", config, history.clone());
        let rooms = RoomRegistry::new(Default::default());
        let clients = ClientRegistry::new();
        let hooks = EventHooks::default();

        for text in ["m1", "m2", "m3", "m4"] {
            room.trigger(
                "message",
                serde_json::json!({"text": text}),
                None,
                None,
                &hooks,
                &ctx(&rooms, &clients),
            )
            .unwrap();
        }

        let got = history.get("chat", "message", 0, 10);
        assert_eq!(got.len(), 3);
    }
}
