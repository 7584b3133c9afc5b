//! Connection Manager.
//!
//! Indexes clients to backend connections and shares long-lived LISTEN
//! connections across clients with identical (host, port, database, user)
//! fingerprints. Every method here runs inside the supervisor's single
//! serialized message loop — there is no internal locking, by design.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use log::warn;

use crate::client::ClientId;
use crate::db::driver::Driver;
use crate::db::{ConnectRequest, ConnectionId, Fingerprint};
use crate::protocol::request::Envelope;

struct SharedListen {
    connection_id: ConnectionId,
    channel: String,
    listeners: HashSet<ClientId>,
}

/// What the caller (the client state machine / supervisor) should do after
/// calling a `ConnectionManager` method that doesn't resolve synchronously.
pub enum Outcome {
    /// Resolved immediately; respond with this to the originating client.
    ImmediateSuccess,
    /// Resolved immediately with an error; respond with this message.
    ImmediateError(&'static str),
    /// A driver call was issued; the response will arrive later as a
    /// `DriverEvent` routed back through `ConnectionManager::on_driver_event`.
    Pending,
}

pub struct ConnectionManager {
    connect_requests: HashMap<ClientId, (ConnectRequest, Envelope)>,
    connection_ids: HashMap<ClientId, ConnectionId>,
    shared_listen: HashMap<(Fingerprint, String), SharedListen>,
    /// Clients with an unlisten-reconnect in flight, so the resulting
    /// `InternalUnlistenConnected`/`Failed` event can be answered correctly.
    pending_unlisten: HashMap<ClientId, Envelope>,
    stopping: bool,
}

impl ConnectionManager {
    pub fn new() -> Self {
        ConnectionManager {
            connect_requests: HashMap::new(),
            connection_ids: HashMap::new(),
            shared_listen: HashMap::new(),
            pending_unlisten: HashMap::new(),
            stopping: false,
        }
    }

    pub fn set_stopping(&mut self, stopping: bool) {
        self.stopping = stopping;
    }

    pub fn connection_id_of(&self, client_id: ClientId) -> Option<ConnectionId> {
        self.connection_ids.get(&client_id).copied()
    }

    pub fn connect_request_of(&self, client_id: ClientId) -> Option<&ConnectRequest> {
        self.connect_requests.get(&client_id).map(|(cr, _)| cr)
    }

    /// Invariant I2: a client is "non-listen" iff its connection isn't the
    /// backing connection of any shared LISTEN entry.
    pub fn is_non_listen_connection(&self, client_id: ClientId) -> bool {
        match self.connection_ids.get(&client_id) {
            None => true,
            Some(connection_id) => !self
                .shared_listen
                .values()
                .any(|entry| entry.connection_id == *connection_id),
        }
    }

    pub fn is_listening_on_channel(&self, client_id: ClientId, channel: &str) -> bool {
        match self.connection_ids.get(&client_id) {
            None => false,
            Some(connection_id) => self.shared_listen.values().any(|entry| {
                entry.connection_id == *connection_id
                    && entry.channel == channel
                    && entry.listeners.contains(&client_id)
            }),
        }
    }

    pub fn is_connected(&self, client_id: ClientId) -> bool {
        self.connection_ids.contains_key(&client_id)
    }

    /// Stores the client's connect request and fires off a driver-level
    /// connect; the result arrives later as a `Connected`/`ConnectFailed`
    /// driver event.
    pub fn connect(
        &mut self,
        client_id: ClientId,
        request: ConnectRequest,
        envelope: Envelope,
        driver: &dyn Driver,
        timeout: Duration,
    ) -> Outcome {
        self.connect_requests.insert(client_id, (request.clone(), envelope));
        driver.connect(client_id, request, timeout);
        Outcome::Pending
    }

    /// Called when the driver reports a successful connect. If the client's
    /// connect record still exists, installs the connection id; otherwise the
    /// client already disconnected while the connect was in flight, so the
    /// fresh connection is immediately discarded.
    pub fn on_connected(&mut self, client_id: ClientId, connection_id: ConnectionId, driver: &dyn Driver) -> bool {
        if self.connect_requests.contains_key(&client_id) {
            self.connection_ids.insert(client_id, connection_id);
            true
        } else {
            driver.disconnect(client_id, connection_id, true);
            false
        }
    }

    /// Disconnects a client. If the client is the last one sharing its
    /// connection id, issues a real driver disconnect; otherwise just drops
    /// this client's mapping and reports success immediately.
    pub fn disconnect(
        &mut self,
        client_id: ClientId,
        discard_connection: bool,
        driver: &dyn Driver,
    ) -> Outcome {
        let Some(connection_id) = self.connection_ids.get(&client_id).copied() else {
            return Outcome::ImmediateError(crate::client::NOT_CONNECTED);
        };
        let sharer_count = self
            .connection_ids
            .values()
            .filter(|id| **id == connection_id)
            .count();

        if sharer_count <= 1 {
            self.connection_ids.remove(&client_id);
            self.connect_requests.remove(&client_id);
            self.remove_shared_entries_for(connection_id);
            driver.disconnect(client_id, connection_id, discard_connection);
            Outcome::Pending
        } else {
            self.connection_ids.remove(&client_id);
            self.connect_requests.remove(&client_id);
            self.remove_listener_reference(client_id, connection_id);
            Outcome::ImmediateSuccess
        }
    }

    /// Starts or joins a LISTEN on `channel`. If a shared LISTEN connection
    /// already exists for this client's fingerprint and channel, rebinds the
    /// client to it and releases its former connection; otherwise installs a
    /// new shared entry owning the client's current connection and issues a
    /// driver-level listen.
    pub fn listen(
        &mut self,
        client_id: ClientId,
        channel: String,
        driver: &dyn Driver,
    ) -> Outcome {
        let Some((request, _envelope)) = self.connect_requests.get(&client_id).cloned() else {
            return Outcome::ImmediateError(crate::client::NOT_CONNECTED);
        };
        let fingerprint = request.fingerprint();
        let key = (fingerprint.clone(), channel.clone());

        if let Some(shared) = self.shared_listen.get_mut(&key) {
            let former_connection_id = self.connection_ids.insert(client_id, shared.connection_id);
            shared.listeners.insert(client_id);
            if let Some(former) = former_connection_id {
                if former != shared.connection_id {
                    driver.disconnect(client_id, former, true);
                }
            }
            return Outcome::ImmediateSuccess;
        }

        let Some(connection_id) = self.connection_ids.get(&client_id).copied() else {
            return Outcome::ImmediateError(crate::client::NOT_CONNECTED);
        };
        self.shared_listen.insert(
            key,
            SharedListen {
                connection_id,
                channel: channel.clone(),
                listeners: HashSet::from([client_id]),
            },
        );
        driver.listen(client_id, connection_id, channel);
        Outcome::Pending
    }

    /// Stops listening on `channel`. If the client is the last sharer of the
    /// shared LISTEN entry, responds success immediately and leaves the entry
    /// to decay when its owner disconnects. Otherwise the client needs its
    /// own non-listen connection, so a fresh driver connect is issued and the
    /// response is deferred until it completes.
    pub fn unlisten(
        &mut self,
        client_id: ClientId,
        channel: &str,
        envelope: Envelope,
        driver: &dyn Driver,
        timeout: Duration,
    ) -> Outcome {
        let Some(connection_id) = self.connection_ids.get(&client_id).copied() else {
            return Outcome::ImmediateError(crate::client::NOT_CONNECTED);
        };
        let request = self
            .connect_requests
            .get(&client_id)
            .map(|(cr, _)| cr.clone());

        let key = self.shared_listen.iter().find_map(|(key, entry)| {
            if entry.connection_id == connection_id && entry.channel == channel {
                Some(key.clone())
            } else {
                None
            }
        });
        let Some(key) = key else {
            return Outcome::ImmediateError(crate::client::NOT_LISTENING_TO_CHANNEL);
        };

        let is_last = {
            let entry = self.shared_listen.get(&key).expect("key just found");
            entry.listeners.len() <= 1
        };

        if is_last {
            // Leave the shared slot to decay when the owner disconnects.
            if let Some(entry) = self.shared_listen.get_mut(&key) {
                entry.listeners.remove(&client_id);
            }
            Outcome::ImmediateSuccess
        } else {
            if let Some(entry) = self.shared_listen.get_mut(&key) {
                entry.listeners.remove(&client_id);
            }
            self.connection_ids.remove(&client_id);
            self.pending_unlisten.insert(client_id, envelope);
            match request {
                Some(request) => {
                    driver.reconnect_for_unlisten(client_id, request, timeout);
                    Outcome::Pending
                }
                None => Outcome::ImmediateError(crate::client::NOT_CONNECTED),
            }
        }
    }

    pub fn take_pending_unlisten(&mut self, client_id: ClientId) -> Option<Envelope> {
        self.pending_unlisten.remove(&client_id)
    }

    pub fn on_internal_unlisten_connected(&mut self, client_id: ClientId, connection_id: ConnectionId) {
        self.connection_ids.insert(client_id, connection_id);
    }

    /// Clients whose `connectionIds` equals `connection_id` — used both for
    /// LISTEN event fan-out and `ConnectionLost` fan-out.
    pub fn clients_bound_to(&self, connection_id: ConnectionId) -> Vec<ClientId> {
        self.connection_ids
            .iter()
            .filter(|(_, id)| **id == connection_id)
            .map(|(client_id, _)| *client_id)
            .collect()
    }

    /// Tears down every client bound to a connection that died unexpectedly,
    /// along with any shared-listen entries it backed.
    pub fn on_connection_lost(&mut self, connection_id: ConnectionId) -> Vec<ClientId> {
        let affected = self.clients_bound_to(connection_id);
        for client_id in &affected {
            self.connection_ids.remove(client_id);
            self.connect_requests.remove(client_id);
        }
        self.shared_listen
            .retain(|_, entry| entry.connection_id != connection_id);
        affected
    }

    /// Drops every client's bookkeeping without touching the driver — used
    /// only by forced supervisor shutdown after the driver side has already
    /// been told to disconnect.
    pub fn forget_client(&mut self, client_id: ClientId) {
        self.connection_ids.remove(&client_id);
        self.connect_requests.remove(&client_id);
        self.pending_unlisten.remove(&client_id);
        for entry in self.shared_listen.values_mut() {
            entry.listeners.remove(&client_id);
        }
    }

    fn remove_listener_reference(&mut self, client_id: ClientId, connection_id: ConnectionId) {
        for entry in self.shared_listen.values_mut() {
            if entry.connection_id == connection_id {
                entry.listeners.remove(&client_id);
            }
        }
    }

    fn remove_shared_entries_for(&mut self, connection_id: ConnectionId) {
        let before = self.shared_listen.len();
        self.shared_listen
            .retain(|_, entry| entry.connection_id != connection_id);
        if self.shared_listen.len() != before {
            warn!(
                "removed shared LISTEN entries backed by disconnected connection {}",
                connection_id
            );
        }
    }

    /// Snapshot count used by the idle state dump; also exercised by tests.
    pub fn shared_listen_count(&self) -> usize {
        self.shared_listen.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::request::{FuncValue, RequestIdValue};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<String>>,
    }

    impl Driver for RecordingDriver {
        fn connect(&self, _client_id: ClientId, _request: ConnectRequest, _timeout: Duration) {
            self.calls.lock().unwrap().push("connect".to_string());
        }
        fn reconnect_for_unlisten(&self, _client_id: ClientId, _request: ConnectRequest, _timeout: Duration) {
            self.calls.lock().unwrap().push("reconnect_for_unlisten".to_string());
        }
        fn disconnect(&self, _client_id: ClientId, _connection_id: ConnectionId, _discard: bool) {
            self.calls.lock().unwrap().push("disconnect".to_string());
        }
        fn query(&self, _client_id: ClientId, _connection_id: ConnectionId, _sql: String, _record_count: i64) {}
        fn more_query_results(&self, _client_id: ClientId, _connection_id: ConnectionId) {}
        fn execute_sql(&self, _client_id: ClientId, _connection_id: ConnectionId, _sql: String) {}
        fn listen(&self, _client_id: ClientId, _connection_id: ConnectionId, _channel: String) {
            self.calls.lock().unwrap().push("listen".to_string());
        }
    }

    fn envelope() -> Envelope {
        Envelope {
            request_id: RequestIdValue::Id(1),
            func: FuncValue::Known("connect".to_string()),
            session_id: Some("s".to_string()),
            raw: "{}".to_string(),
        }
    }

    fn connect_request() -> ConnectRequest {
        ConnectRequest {
            host: "h".to_string(),
            port: 5432,
            database: "d".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        }
    }

    #[test]
    fn disconnect_without_connect_is_an_error() {
        let mut manager = ConnectionManager::new();
        let driver = RecordingDriver::default();
        let outcome = manager.disconnect(ClientId::new(), true, &driver);
        assert!(matches!(outcome, Outcome::ImmediateError(crate::client::NOT_CONNECTED)));
    }

    #[test]
    fn listen_sharing_two_clients_one_backend() {
        let mut manager = ConnectionManager::new();
        let driver = RecordingDriver::default();

        let client_a = ClientId::new();
        let client_b = ClientId::new();
        let connection_a = ConnectionId::new();
        let connection_b = ConnectionId::new();

        manager.connect(client_a, connect_request(), envelope(), &driver, Duration::from_secs(1));
        manager.on_connected(client_a, connection_a, &driver);
        manager.connect(client_b, connect_request(), envelope(), &driver, Duration::from_secs(1));
        manager.on_connected(client_b, connection_b, &driver);

        let outcome_a = manager.listen(client_a, "events".to_string(), &driver);
        assert!(matches!(outcome_a, Outcome::Pending));
        assert_eq!(manager.shared_listen_count(), 1);

        let outcome_b = manager.listen(client_b, "events".to_string(), &driver);
        assert!(matches!(outcome_b, Outcome::ImmediateSuccess));
        assert_eq!(manager.shared_listen_count(), 1);
        assert_eq!(manager.connection_id_of(client_b), Some(connection_a));
    }

    #[test]
    fn unlisten_with_other_sharers_reconnects() {
        let mut manager = ConnectionManager::new();
        let driver = RecordingDriver::default();
        let client_a = ClientId::new();
        let client_b = ClientId::new();
        let connection_a = ConnectionId::new();
        let connection_b = ConnectionId::new();

        manager.connect(client_a, connect_request(), envelope(), &driver, Duration::from_secs(1));
        manager.on_connected(client_a, connection_a, &driver);
        manager.connect(client_b, connect_request(), envelope(), &driver, Duration::from_secs(1));
        manager.on_connected(client_b, connection_b, &driver);
        manager.listen(client_a, "events".to_string(), &driver);
        manager.listen(client_b, "events".to_string(), &driver);

        let outcome = manager.unlisten(client_a, "events", envelope(), &driver, Duration::from_secs(1));
        assert!(matches!(outcome, Outcome::Pending));
        assert!(manager.connection_id_of(client_a).is_none());
        assert_eq!(manager.shared_listen_count(), 1);
    }

    #[test]
    fn connection_lost_clears_all_bound_clients() {
        let mut manager = ConnectionManager::new();
        let driver = RecordingDriver::default();
        let client_a = ClientId::new();
        let connection_a = ConnectionId::new();
        manager.connect(client_a, connect_request(), envelope(), &driver, Duration::from_secs(1));
        manager.on_connected(client_a, connection_a, &driver);

        let affected = manager.on_connection_lost(connection_a);
        assert_eq!(affected, vec![client_a]);
        assert!(manager.connection_id_of(client_a).is_none());
    }
}
