//! `dialogue_core::wire::Transport` over a socket.io connection, the thin
//! adapter `dialogue-core` leaves for a real transport to supply (§1).

use dialogue_core::wire::Transport;
use socketioxide::extract::SocketRef;
use socketioxide::socket::Sid;
use socketioxide::SocketIo;

/// Holds the namespace handle and this connection's id rather than the
/// `SocketRef` itself: `SocketRef::disconnect` consumes by value, and
/// `io.get_socket(id)` is how a fresh handle to the same connection is
/// obtained on demand (§1 "transport adapter" boundary).
pub struct SocketTransport {
    io: SocketIo,
    id: Sid,
    connection_id: String,
}

impl SocketTransport {
    pub fn new(io: SocketIo, socket: &SocketRef) -> Self {
        Self {
            io,
            id: socket.id,
            connection_id: socket.id.to_string(),
        }
    }

    fn socket(&self) -> Option<SocketRef> {
        self.io.get_socket(self.id)
    }
}

impl Transport for SocketTransport {
    fn connection_id(&self) -> &str {
        &self.connection_id
    }

    fn emit(&self, frame: &str, payload: serde_json::Value) {
        let Some(socket) = self.socket() else { return };
        if let Err(err) = socket.emit(frame.to_string(), &payload) {
            tracing::warn!(frame, error = %err, "failed to emit frame to socket");
        }
    }

    fn emit_to_group(&self, group: &str, frame: &str, payload: serde_json::Value) {
        if let Err(err) = self.io.within(group.to_string()).emit(frame.to_string(), &payload) {
            tracing::warn!(frame, group, error = %err, "failed to emit frame to room");
        }
    }

    fn join_group(&self, group: &str) {
        let Some(socket) = self.socket() else { return };
        if let Err(err) = socket.join(group.to_string()) {
            tracing::warn!(group, error = %err, "failed to join socket.io room");
        }
    }

    fn leave_group(&self, group: &str) {
        let Some(socket) = self.socket() else { return };
        if let Err(err) = socket.leave(group.to_string()) {
            tracing::warn!(group, error = %err, "failed to leave socket.io room");
        }
    }

    fn disconnect(&self) {
        let Some(socket) = self.socket() else { return };
        if let Err(err) = socket.disconnect() {
            tracing::warn!(error = %err, "failed to disconnect socket");
        }
    }
}
