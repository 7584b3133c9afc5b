//! Per-client state: one instance per connected WebSocket client. Holds no
//! connection to the database directly — every DB-shaped request is
//! dispatched through the [`crate::connection_manager::ConnectionManager`]
//! the supervisor owns.

use std::fmt;
use std::time::Instant;

use uuid::Uuid;

use crate::protocol::request::Envelope;

/// Opaque identifier assigned by the WebSocket layer to each accepted
/// connection; stable for the lifetime of that WebSocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    pub fn new() -> Self {
        ClientId(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ClientId {
    fn from(id: Uuid) -> Self {
        ClientId(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub const NOT_CONNECTED: &str = "Operation NOT allowed since not connected";
pub const ALREADY_LISTENING: &str = "Operation NOT allowed since connection is ALREADY used for listening";
pub const IS_LISTENING: &str = "Operation NOT allowed since connection is used for listening";
pub const NOT_LISTENING_TO_CHANNEL: &str =
    "Operation NOT allowed since connection is NOT listening to specified channel";
pub const INVALID_SESSION: &str = "Invalid session";

/// Per-client bookkeeping record.
#[derive(Debug, Clone)]
pub struct Client {
    pub client_id: ClientId,
    /// True while live; false once stop is initiated or disconnection is
    /// recorded. Once false, the responder's sends become no-ops.
    pub running: bool,
    /// Set on a WebSocket send error. Monotonic: only destruction clears it.
    /// Every later request for this client is answered with an error
    /// referencing this message.
    pub fatal_error: Option<String>,
    /// Set when the WebSocket disconnects; starts the GC countdown.
    pub disconnected_at: Option<Instant>,
    /// The raw request that initiated the client's current LISTEN, kept so
    /// unsolicited notifications can be tagged with it.
    pub listen_request: Option<Envelope>,
    /// The envelope of the most recently dispatched request, used to tag an
    /// unsolicited `ConnectionLost` error against the client's most recent
    /// request.
    pub last_request: Option<Envelope>,
}

impl Client {
    pub fn new(client_id: ClientId) -> Self {
        Client {
            client_id,
            running: true,
            fatal_error: None,
            disconnected_at: None,
            listen_request: None,
            last_request: None,
        }
    }

    pub fn mark_stopped(&mut self) {
        self.running = false;
    }

    pub fn mark_disconnected(&mut self, at: Instant) {
        self.running = false;
        self.disconnected_at = Some(at);
    }

    pub fn set_fatal_error(&mut self, message: String) {
        if self.fatal_error.is_none() {
            self.fatal_error = Some(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_error_is_monotonic() {
        let mut client = Client::new(ClientId::new());
        client.set_fatal_error("first".to_string());
        client.set_fatal_error("second".to_string());
        assert_eq!(client.fatal_error.as_deref(), Some("first"));
    }

    #[test]
    fn mark_disconnected_stops_and_stamps() {
        let mut client = Client::new(ClientId::new());
        let now = Instant::now();
        client.mark_disconnected(now);
        assert!(!client.running);
        assert_eq!(client.disconnected_at, Some(now));
    }
}
