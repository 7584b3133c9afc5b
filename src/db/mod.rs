//! Backend Postgres driver interface.
//!
//! The Postgres driver is treated as an external collaborator with a fixed
//! interface (connect/disconnect/query/executeSql/listen), modeled here as
//! the [`Driver`] trait, separating "how to reach Postgres" from its callers.
//! The shipped implementation, [`driver::SqlxDriver`], uses `sqlx`.

pub mod driver;

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier for a backend Postgres connection, assigned by the
/// driver on successful connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        ConnectionId(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fields a client supplies on `connect`. The *fingerprint* (host, port,
/// database, user) is the sharing key for LISTEN connections; password is
/// deliberately excluded so clients with identical credentials but supplied
/// via different requests can still share a LISTEN backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

pub type Fingerprint = (String, u16, String, String);

impl ConnectRequest {
    pub fn fingerprint(&self) -> Fingerprint {
        (
            self.host.clone(),
            self.port,
            self.database.clone(),
            self.user.clone(),
        )
    }
}

/// Events the driver reports back asynchronously. Every operation on
/// [`Driver`] is fire-and-forget; its outcome arrives later as one of these,
/// which the connection manager folds back into `SupervisorMessage::DriverEvent`.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    Connected {
        client_id: crate::client::ClientId,
        connection_id: ConnectionId,
    },
    ConnectFailed {
        client_id: crate::client::ClientId,
        error: String,
    },
    Disconnected {
        client_id: crate::client::ClientId,
    },
    DisconnectFailed {
        client_id: crate::client::ClientId,
        error: String,
    },
    QueryResult {
        client_id: crate::client::ClientId,
        records: Vec<String>,
    },
    QueryFailed {
        client_id: crate::client::ClientId,
        error: String,
    },
    ExecuteSqlResult {
        client_id: crate::client::ClientId,
        count: i64,
    },
    ExecuteSqlFailed {
        client_id: crate::client::ClientId,
        error: String,
    },
    ListenStarted {
        client_id: crate::client::ClientId,
        connection_id: ConnectionId,
    },
    ListenFailed {
        client_id: crate::client::ClientId,
        error: String,
    },
    /// The client's fresh non-shared connection is ready after an unlisten
    /// reconnect.
    InternalUnlistenConnected {
        client_id: crate::client::ClientId,
        connection_id: ConnectionId,
    },
    InternalUnlistenConnectFailed {
        client_id: crate::client::ClientId,
        error: String,
    },
    /// A NOTIFY delivered on a shared LISTEN connection. Fanned out by the
    /// connection manager to every client bound to `connection_id`.
    ListenEvent {
        connection_id: ConnectionId,
        payload: String,
    },
    /// The backend connection died unexpectedly (network error, server
    /// restart). Fanned out to every client bound to `connection_id`.
    ConnectionLost {
        connection_id: ConnectionId,
        error: String,
    },
}
