//! Bounded in-memory history per (room, event name), with FIFO eviction
//! and pluggable cleanup/load hooks (§4.3).

use crate::message::EventMessage;
use dashmap::DashMap;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// `onCleanup(roomId, eventName, evicted[])` — fire-and-forget, failures
/// are logged and never propagated (§4.3).
pub trait CleanupHook: Send + Sync {
    fn on_cleanup(&self, room_id: &str, event_name: &str, evicted: &[EventMessage]);
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// `onLoad(roomId, eventName, start, end) -> Promise<EventMessage[]>` —
/// the one suspension point in the history read path (§4.3, §5).
pub trait LoadHook: Send + Sync {
    fn on_load(
        &self,
        room_id: &str,
        event_name: &str,
        start: i64,
        end: i64,
    ) -> BoxFuture<'_, Result<Vec<EventMessage>, String>>;
}

/// Per-(room, event) buffer, oldest-first in storage.
#[derive(Default)]
struct Buffer {
    messages: Vec<EventMessage>,
}

/// Backing store: `rooms -> (eventName -> buffer)`.
#[derive(Default)]
pub struct HistoryStore {
    rooms: DashMap<String, HashMap<String, Buffer>>,
    cleanup_hook: Option<std::sync::Arc<dyn CleanupHook>>,
    load_hook: Option<std::sync::Arc<dyn LoadHook>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hooks(
        cleanup_hook: Option<std::sync::Arc<dyn CleanupHook>>,
        load_hook: Option<std::sync::Arc<dyn LoadHook>>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            cleanup_hook,
            load_hook,
        }
    }

    /// `push(roomId, eventName, msg, limit)`.
    pub fn push(&self, room_id: &str, event_name: &str, msg: EventMessage, limit: usize) {
        let evicted = {
            let mut room = self.rooms.entry(room_id.to_string()).or_default();
            let buffer = room.entry(event_name.to_string()).or_default();
            buffer.messages.push(msg);

            let mut evicted = Vec::new();
            while buffer.messages.len() > limit {
                evicted.push(buffer.messages.remove(0));
            }
            evicted
        };

        if !evicted.is_empty() {
            if let Some(hook) = &self.cleanup_hook {
                hook.on_cleanup(room_id, event_name, &evicted);
            }
        }
    }

    /// `get(roomId, eventName, start, end)` — newest-first positions
    /// translated into the oldest-first storage slice `[len-end, len-start)`,
    /// then reversed.
    pub fn get(&self, room_id: &str, event_name: &str, start: i64, end: i64) -> Vec<EventMessage> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };
        let Some(buffer) = room.get(event_name) else {
            return Vec::new();
        };

        let len = buffer.messages.len() as i64;
        let lo = (len - end).max(0);
        let hi = (len - start).max(0).min(len);
        if lo >= hi {
            return Vec::new();
        }

        let mut slice = buffer.messages[lo as usize..hi as usize].to_vec();
        slice.reverse();
        slice
    }

    /// `getAll(roomId, limit?)` — every event-type buffer in the room,
    /// newest-first, truncated. Used only for `syncHistoryOnJoin`.
    pub fn get_all(&self, room_id: &str, limit: Option<usize>) -> Vec<EventMessage> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };

        let mut all: Vec<EventMessage> = room
            .values()
            .flat_map(|buffer| buffer.messages.iter().cloned())
            .collect();
        all.sort_by_key(|m| std::cmp::Reverse(m.timestamp));
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        all
    }

    /// Room-wide read for `getHistory` with `eventName` omitted: aggregates
    /// every event-type buffer into one newest-first sequence (the same
    /// ordering `getAll` produces) and applies `get`'s newest-first
    /// pagination window directly, since the aggregate is already
    /// newest-first. No external-load fallback: `onLoad` is keyed by a
    /// single `eventName`, so there is nothing to fall back to here.
    pub fn get_room(&self, room_id: &str, start: i64, end: i64) -> Vec<EventMessage> {
        let Some(room) = self.rooms.get(room_id) else {
            return Vec::new();
        };

        let mut all: Vec<EventMessage> = room
            .values()
            .flat_map(|buffer| buffer.messages.iter().cloned())
            .collect();
        all.sort_by_key(|m| std::cmp::Reverse(m.timestamp));

        let len = all.len() as i64;
        let lo = start.max(0).min(len) as usize;
        let hi = end.max(0).min(len) as usize;
        if lo >= hi {
            return Vec::new();
        }
        all[lo..hi].to_vec()
    }

    /// `count(roomId, eventName)`.
    pub fn count(&self, room_id: &str, event_name: &str) -> usize {
        self.rooms
            .get(room_id)
            .and_then(|room| room.get(event_name).map(|b| b.messages.len()))
            .unwrap_or(0)
    }

    /// `clearRoom(roomId)` — emits a final `onCleanup` per non-empty
    /// event-type buffer, then deletes the room's history entirely.
    pub fn clear_room(&self, room_id: &str) {
        if let Some((_, room)) = self.rooms.remove(room_id) {
            if let Some(hook) = &self.cleanup_hook {
                for (event_name, buffer) in room {
                    if !buffer.messages.is_empty() {
                        hook.on_cleanup(room_id, &event_name, &buffer.messages);
                    }
                }
            }
        }
    }

    /// Paginated read with external fallback (`Room.history`, §4.3). Calls
    /// `get(...)` first; if it already satisfies `end - start` or no
    /// `onLoad` hook is configured, returns immediately. Otherwise requests
    /// the remainder from external storage and concatenates
    /// in-memory-first.
    pub async fn history(
        &self,
        room_id: &str,
        event_name: &str,
        start: i64,
        end: i64,
    ) -> Vec<EventMessage> {
        let in_memory = self.get(room_id, event_name, start, end);

        if in_memory.len() as i64 == end - start {
            return in_memory;
        }
        let Some(hook) = &self.load_hook else {
            return in_memory;
        };

        let k = self.count(room_id, event_name) as i64;
        let load_start = start.max(k) - k;
        let load_end = end - k;

        match hook.on_load(room_id, event_name, load_start, load_end).await {
            Ok(external) => {
                let mut combined = in_memory;
                combined.extend(external);
                combined
            }
            Err(err) => {
                tracing::warn!(room_id, event_name, error = %err, "onLoad hook failed");
                in_memory
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn msg(text: &str) -> EventMessage {
        EventMessage::new("message", "room-1", serde_json::json!({"text": text}), None, None)
    }

    #[test]
    fn round_trip_push_then_get() {
        let store = HistoryStore::new();
        let m = msg("hi");
        store.push("room-1", "message", m.clone(), 10);
        let got = store.get("room-1", "message", 0, 1);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].data, m.data);
    }

    #[test]
    fn get_returns_newest_first() {
        let store = HistoryStore::new();
        for text in ["m1", "m2", "m3"] {
            store.push("room-1", "message", msg(text), 10);
        }
        let got = store.get("room-1", "message", 0, 10);
        let texts: Vec<_> = got.iter().map(|m| m.data["text"].as_str().unwrap()).collect();
        assert_eq!(texts, vec!["m3", "m2", "m1"]);
    }

    struct CountingCleanup(Arc<AtomicUsize>);
    impl CleanupHook for CountingCleanup {
        fn on_cleanup(&self, _room_id: &str, _event_name: &str, evicted: &[EventMessage]) {
            self.0.fetch_add(evicted.len(), Ordering::SeqCst);
        }
    }

    #[test]
    fn eviction_trims_to_limit_and_invokes_cleanup_hook() {
        let evicted_count = Arc::new(AtomicUsize::new(0));
        let store = HistoryStore::with_hooks(
            Some(Arc::new(CountingCleanup(evicted_count.clone()))),
            None,
        );
        for text in ["m1", "m2", "m3", "m4"] {
            store.push("room-1", "message", msg(text), 3);
        }
        let got = store.get("room-1", "message", 0, 10);
        assert_eq!(got.len(), 3);
        let texts: Vec<_> = got.iter().map(|m| m.data["text"].as_str().unwrap()).collect();
        assert_eq!(texts, vec!["m4", "m3", "m2"]);
        assert_eq!(evicted_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn out_of_range_yields_empty() {
        let store = HistoryStore::new();
        store.push("room-1", "message", msg("m1"), 10);
        assert!(store.get("room-1", "message", 5, 10).is_empty());
        assert!(store.get("missing-room", "message", 0, 10).is_empty());
    }

    #[test]
    fn get_all_sorts_across_event_types_and_truncates() {
        let store = HistoryStore::new();
        store.push("room-1", "message", msg("m1"), 10);
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.push("room-1", "typing", msg("t1"), 10);
        std::thread::sleep(std::time::Duration::from_millis(2));
        store.push("room-1", "message", msg("m2"), 10);

        let all = store.get_all("room-1", None);
        assert_eq!(all.len(), 3);
        assert!(all[0].timestamp >= all[1].timestamp);
        assert!(all[1].timestamp >= all[2].timestamp);

        let limited = store.get_all("room-1", Some(2));
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn clear_room_emits_final_cleanup_and_deletes() {
        let evicted_count = Arc::new(AtomicUsize::new(0));
        let store = HistoryStore::with_hooks(
            Some(Arc::new(CountingCleanup(evicted_count.clone()))),
            None,
        );
        store.push("room-1", "message", msg("m1"), 10);
        store.push("room-1", "message", msg("m2"), 10);
        store.clear_room("room-1");
        assert_eq!(evicted_count.load(Ordering::SeqCst), 2);
        assert_eq!(store.count("room-1", "message"), 0);
    }

    struct FixedLoader(Vec<EventMessage>);
    impl LoadHook for FixedLoader {
        fn on_load(
            &self,
            _room_id: &str,
            _event_name: &str,
            _start: i64,
            _end: i64,
        ) -> BoxFuture<'_, Result<Vec<EventMessage>, String>> {
            let msgs = self.0.clone();
            Box::pin(async move { Ok(msgs) })
        }
    }

    #[tokio::test]
    async fn history_falls_back_to_external_load_when_in_memory_is_short() {
        let external = vec![msg("older-1"), msg("older-2")];
        let store = HistoryStore::with_hooks(None, Some(Arc::new(FixedLoader(external.clone()))));
        for text in ["m1", "m2", "m3", "m4", "m5"] {
            store.push("room-1", "message", msg(text), 5);
        }

        let page = store.history("room-1", "message", 0, 7).await;
        assert_eq!(page.len(), 7);
        assert_eq!(page[5].data["text"], "older-1");
        assert_eq!(page[6].data["text"], "older-2");
    }

    #[tokio::test]
    async fn history_skips_load_hook_when_in_memory_already_satisfies_range() {
        let store = HistoryStore::with_hooks(
            None,
            Some(Arc::new(FixedLoader(vec![msg("should-not-appear")]))),
        );
        store.push("room-1", "message", msg("m1"), 5);
        store.push("room-1", "message", msg("m2"), 5);

        let page = store.history("room-1", "message", 0, 2).await;
        assert_eq!(page.len(), 2);
        assert!(page.iter().all(|m| m.data["text"] != "should-not-appear"));
    }
}
