//! In-memory `Transport` fake shared by unit tests across modules.

#![cfg(test)]

use crate::wire::Transport;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct FakeTransport {
    connection_id: String,
    emitted: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    groups: Arc<Mutex<Vec<String>>>,
    disconnected: Arc<Mutex<bool>>,
}

impl FakeTransport {
    pub(crate) fn new(connection_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            connection_id: connection_id.into(),
            emitted: Arc::new(Mutex::new(Vec::new())),
            groups: Arc::new(Mutex::new(Vec::new())),
            disconnected: Arc::new(Mutex::new(false)),
        })
    }

    pub(crate) fn frames_named(&self, frame: &str) -> Vec<serde_json::Value> {
        self.emitted
            .lock()
            .iter()
            .filter(|(name, _)| name == frame)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    #[allow(dead_code)]
    pub(crate) fn is_disconnected(&self) -> bool {
        *self.disconnected.lock()
    }

    #[allow(dead_code)]
    pub(crate) fn groups(&self) -> Vec<String> {
        self.groups.lock().clone()
    }
}

impl Transport for FakeTransport {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn emit(&self, frame: &str, payload: serde_json::Value) {
        self.emitted.lock().push((frame.to_string(), payload));
    }

    fn emit_to_group(&self, _group: &str, frame: &str, payload: serde_json::Value) {
        self.emitted.lock().push((frame.to_string(), payload));
    }

    fn join_group(&self, group: &str) {
        self.groups.lock().push(group.to_string());
    }

    fn leave_group(&self, group: &str) {
        self.groups.lock().retain(|g| g != group);
    }

    fn disconnect(&self) {
        *self.disconnected.lock() = true;
    }
}
