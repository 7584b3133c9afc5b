//! Proxy Supervisor.
//!
//! Owns the client table, the connection manager, start/stop lifecycle, the
//! 1-second tick, credential remapping, and authentication. Every public
//! entry point is a [`SupervisorMessage`] processed to completion by
//! [`ProxySupervisor::run`] before the next is drained — a single serialized
//! event loop. Nothing here ever `.await`s mid-mutation: driver calls are
//! fire-and-forget, and their outcomes re-enter as `SupervisorMessage::Driver`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::auth::Authenticator;
use crate::client::{Client, ClientId};
use crate::config::ProxySettings;
use crate::config::settings::RemapTables;
use crate::connection_manager::{ConnectionManager, Outcome};
use crate::db::driver::Driver;
use crate::db::{ConnectRequest, DriverEvent};
use crate::protocol::request::{decode, DecodedRequest, Envelope, FuncValue};
use crate::protocol::response::{format_response, ResponseKind};

const STARTED_MSG: &str = "pgproxy supervisor started";
const STOPPED_MSG: &str = "pgproxy supervisor stopped";

pub enum SupervisorMessage {
    Start,
    Stop,
    DelayedStop,
    ClientDestroyed(ClientId),
    Stopped,
    Tick,
    WsConnected {
        client_id: ClientId,
        outbound: mpsc::UnboundedSender<String>,
    },
    WsDisconnected {
        client_id: ClientId,
    },
    WsMessage {
        client_id: ClientId,
        text: String,
    },
    Driver(DriverEvent),
}

/// Substitutes host/port/database/user/password through the configured
/// lookup tables, all keyed by the client-supplied `host` field (the proxy's
/// way of letting a client name a connection profile without ever seeing its
/// real credentials). Missing keys become `"invalid"` (`0` for port). Skipped
/// entirely when no table has any entries, so a proxy with no remapping
/// configured passes `connect` requests through unchanged.
fn remap_connect(remap: &RemapTables, connect: ConnectRequest) -> ConnectRequest {
    let configured = !remap.host_map.is_empty()
        || !remap.port_map.is_empty()
        || !remap.database_map.is_empty()
        || !remap.user_map.is_empty()
        || !remap.password_map.is_empty();
    if !configured {
        return connect;
    }
    let key = connect.host.clone();
    ConnectRequest {
        host: remap.host_map.get(&key).cloned().unwrap_or_else(|| "invalid".to_string()),
        port: remap.port_map.get(&key).copied().unwrap_or(0),
        database: remap
            .database_map
            .get(&key)
            .cloned()
            .unwrap_or_else(|| "invalid".to_string()),
        user: remap.user_map.get(&key).cloned().unwrap_or_else(|| "invalid".to_string()),
        password: remap
            .password_map
            .get(&key)
            .cloned()
            .unwrap_or_else(|| "invalid".to_string()),
    }
}

pub struct ProxySupervisor {
    clients: HashMap<ClientId, Client>,
    outbound: HashMap<ClientId, mpsc::UnboundedSender<String>>,
    connections: ConnectionManager,
    driver: Arc<dyn Driver>,
    authenticator: Arc<dyn Authenticator>,
    config: ProxySettings,
    running: bool,
    stopping: bool,
    idle_ticks: u64,
    self_tx: mpsc::UnboundedSender<SupervisorMessage>,
}

impl ProxySupervisor {
    pub fn new(
        config: ProxySettings,
        driver: Arc<dyn Driver>,
        authenticator: Arc<dyn Authenticator>,
        self_tx: mpsc::UnboundedSender<SupervisorMessage>,
    ) -> Self {
        ProxySupervisor {
            clients: HashMap::new(),
            outbound: HashMap::new(),
            connections: ConnectionManager::new(),
            driver,
            authenticator,
            config,
            running: false,
            stopping: false,
            idle_ticks: 0,
            self_tx,
        }
    }

    /// Drains `rx` to completion, one message at a time, until a `Stopped`
    /// message ends the loop.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SupervisorMessage>) {
        while let Some(msg) = rx.recv().await {
            if !self.handle(msg) {
                break;
            }
        }
    }

    /// Returns `false` once `Stopped` has been processed, signaling `run` to
    /// exit its loop.
    fn handle(&mut self, msg: SupervisorMessage) -> bool {
        match msg {
            SupervisorMessage::Start => {
                self.running = true;
                info!("{}", STARTED_MSG);
                true
            }
            SupervisorMessage::Stop => {
                self.stopping = true;
                self.running = false;
                self.connections.set_stopping(true);
                for client in self.clients.values_mut() {
                    client.mark_stopped();
                }
                let tx = self.self_tx.clone();
                let delay = self.config.delay_before_stop;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(SupervisorMessage::DelayedStop);
                });
                true
            }
            SupervisorMessage::DelayedStop => {
                if self.clients.is_empty() {
                    let _ = self.self_tx.send(SupervisorMessage::Stopped);
                } else {
                    let now = Instant::now();
                    let ids: Vec<ClientId> = self.clients.keys().copied().collect();
                    for client_id in ids {
                        if let Some(client) = self.clients.get_mut(&client_id) {
                            client.mark_disconnected(now);
                        }
                        self.force_destroy_client(client_id);
                    }
                }
                true
            }
            SupervisorMessage::ClientDestroyed(client_id) => {
                self.destroy_client(client_id);
                if self.clients.is_empty() && !self.running {
                    let _ = self.self_tx.send(SupervisorMessage::Stopped);
                }
                true
            }
            SupervisorMessage::Stopped => {
                info!("{}", STOPPED_MSG);
                if self.config.debug {
                    self.dump_state();
                }
                false
            }
            SupervisorMessage::Tick => {
                self.tick();
                true
            }
            SupervisorMessage::WsConnected { client_id, outbound } => {
                self.clients.insert(client_id, Client::new(client_id));
                self.outbound.insert(client_id, outbound);
                true
            }
            SupervisorMessage::WsDisconnected { client_id } => {
                if let Some(client) = self.clients.get_mut(&client_id) {
                    client.mark_disconnected(Instant::now());
                }
                let _ = self.connections.disconnect(client_id, true, self.driver.as_ref());
                self.outbound.remove(&client_id);
                true
            }
            SupervisorMessage::WsMessage { client_id, text } => {
                self.handle_message(client_id, text);
                true
            }
            SupervisorMessage::Driver(event) => {
                self.handle_driver_event(event);
                true
            }
        }
    }

    fn tick(&mut self) {
        self.idle_ticks += 1;
        let idle_limit = self.config.idle_dump_state_frequency.as_secs().max(1);
        if self.idle_ticks >= idle_limit {
            self.dump_state();
            self.idle_ticks = 0;
        }

        let gc_period = self.config.garbage_collect_disconnected_clients_after_period;
        let now = Instant::now();
        let expired: Vec<ClientId> = self
            .clients
            .iter()
            .filter_map(|(id, client)| client.disconnected_at.map(|at| (*id, now.duration_since(at))))
            .filter(|(_, elapsed)| *elapsed >= gc_period)
            .map(|(id, _)| id)
            .collect();
        for client_id in expired {
            self.schedule_destroy(client_id);
        }
    }

    fn dump_state(&self) {
        debug!(
            "idle state dump: clients={} shared_listen_connections={}",
            self.clients.len(),
            self.connections.shared_listen_count()
        );
    }

    fn schedule_destroy(&self, client_id: ClientId) {
        let _ = self.self_tx.send(SupervisorMessage::ClientDestroyed(client_id));
    }

    /// Forces a client out during shutdown: tells the driver to discard its
    /// backend connection, then schedules removal of the record itself
    /// through the normal `ClientDestroyed` path so GC-in-flight clients and
    /// forced-shutdown clients converge on the same bookkeeping.
    fn force_destroy_client(&mut self, client_id: ClientId) {
        if let Some(connection_id) = self.connections.connection_id_of(client_id) {
            self.driver.disconnect(client_id, connection_id, true);
        }
        self.schedule_destroy(client_id);
    }

    fn destroy_client(&mut self, client_id: ClientId) {
        self.clients.remove(&client_id);
        self.outbound.remove(&client_id);
        self.connections.forget_client(client_id);
    }

    fn handle_message(&mut self, client_id: ClientId, text: String) {
        if self.stopping {
            warn!("rejecting message from {} while stopping", client_id);
            return;
        }
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };
        if !client.running {
            return;
        }

        let decoded = decode(&text);
        let envelope = decoded.envelope().clone();

        let authenticated = match envelope.session_id.as_deref() {
            Some(session_id) if !session_id.is_empty() => {
                self.authenticator.authenticate((), session_id).1
            }
            _ => false,
        };
        if !authenticated {
            self.respond(client_id, &envelope, ResponseKind::Error(crate::client::INVALID_SESSION.to_string()));
            return;
        }

        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_request = Some(envelope.clone());
            if let Some(fatal) = client.fatal_error.clone() {
                self.respond(client_id, &envelope, ResponseKind::Error(fatal));
                return;
            }
        }

        let decoded = match decoded {
            DecodedRequest::Connect { envelope, connect } => DecodedRequest::Connect {
                envelope,
                connect: remap_connect(&self.config.remap, connect),
            },
            other => other,
        };
        self.dispatch(client_id, decoded);
    }

    fn dispatch(&mut self, client_id: ClientId, decoded: DecodedRequest) {
        match decoded {
            DecodedRequest::Connect { envelope, connect } => {
                match self.connections.connect(
                    client_id,
                    connect,
                    envelope.clone(),
                    self.driver.as_ref(),
                    self.config.pg_connect_timeout,
                ) {
                    Outcome::Pending => {}
                    Outcome::ImmediateSuccess => self.respond(client_id, &envelope, ResponseKind::Success),
                    Outcome::ImmediateError(e) => {
                        self.respond(client_id, &envelope, ResponseKind::Error(e.to_string()))
                    }
                }
            }
            DecodedRequest::Disconnect {
                envelope,
                discard_connection,
            } => match self.connections.disconnect(client_id, discard_connection, self.driver.as_ref()) {
                Outcome::Pending => {}
                Outcome::ImmediateSuccess => self.respond(client_id, &envelope, ResponseKind::Success),
                Outcome::ImmediateError(e) => self.respond(client_id, &envelope, ResponseKind::Error(e.to_string())),
            },
            DecodedRequest::Query {
                envelope,
                sql,
                record_count,
            } => {
                if !self.connections.is_connected(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(crate::client::NOT_CONNECTED.to_string()));
                    return;
                }
                if !self.connections.is_non_listen_connection(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(crate::client::IS_LISTENING.to_string()));
                    return;
                }
                let connection_id = self
                    .connections
                    .connection_id_of(client_id)
                    .expect("checked by is_connected above");
                self.driver.query(client_id, connection_id, sql, record_count);
            }
            DecodedRequest::MoreQueryResults { envelope } => {
                if !self.connections.is_connected(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(crate::client::NOT_CONNECTED.to_string()));
                    return;
                }
                if !self.connections.is_non_listen_connection(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(crate::client::IS_LISTENING.to_string()));
                    return;
                }
                let connection_id = self
                    .connections
                    .connection_id_of(client_id)
                    .expect("checked by is_connected above");
                self.driver.more_query_results(client_id, connection_id);
            }
            DecodedRequest::ExecuteSql { envelope, sql } => {
                if !self.connections.is_connected(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(crate::client::NOT_CONNECTED.to_string()));
                    return;
                }
                if !self.connections.is_non_listen_connection(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(crate::client::IS_LISTENING.to_string()));
                    return;
                }
                let connection_id = self
                    .connections
                    .connection_id_of(client_id)
                    .expect("checked by is_connected above");
                self.driver.execute_sql(client_id, connection_id, sql);
            }
            DecodedRequest::Listen { envelope, channel } => {
                if !self.connections.is_connected(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(crate::client::NOT_CONNECTED.to_string()));
                    return;
                }
                if !self.connections.is_non_listen_connection(client_id) {
                    self.respond(
                        client_id,
                        &envelope,
                        ResponseKind::Error(crate::client::ALREADY_LISTENING.to_string()),
                    );
                    return;
                }
                if let Some(client) = self.clients.get_mut(&client_id) {
                    client.listen_request = Some(envelope.clone());
                }
                match self.connections.listen(client_id, channel, self.driver.as_ref()) {
                    Outcome::Pending => {}
                    Outcome::ImmediateSuccess => self.respond(client_id, &envelope, ResponseKind::Success),
                    Outcome::ImmediateError(e) => {
                        if let Some(client) = self.clients.get_mut(&client_id) {
                            client.listen_request = None;
                        }
                        self.respond(client_id, &envelope, ResponseKind::Error(e.to_string()));
                    }
                }
            }
            DecodedRequest::Unlisten { envelope, channel } => {
                if !self.connections.is_listening_on_channel(client_id, &channel) {
                    self.respond(
                        client_id,
                        &envelope,
                        ResponseKind::Error(crate::client::NOT_LISTENING_TO_CHANNEL.to_string()),
                    );
                    return;
                }
                match self.connections.unlisten(
                    client_id,
                    &channel,
                    envelope.clone(),
                    self.driver.as_ref(),
                    self.config.pg_connect_timeout,
                ) {
                    Outcome::Pending => {}
                    Outcome::ImmediateSuccess => {
                        if let Some(client) = self.clients.get_mut(&client_id) {
                            client.listen_request = None;
                        }
                        self.respond(client_id, &envelope, ResponseKind::Success);
                    }
                    Outcome::ImmediateError(e) => {
                        self.respond(client_id, &envelope, ResponseKind::Error(e.to_string()))
                    }
                }
            }
            DecodedRequest::Unknown { envelope, detail } => {
                self.respond(client_id, &envelope, ResponseKind::Error(detail));
            }
        }
    }

    fn handle_driver_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Connected { client_id, connection_id } => {
                let installed = self.connections.on_connected(client_id, connection_id, self.driver.as_ref());
                if installed {
                    self.respond_last(client_id, ResponseKind::Success);
                }
            }
            DriverEvent::ConnectFailed { client_id, error } => {
                self.respond_last(client_id, ResponseKind::Error(error));
            }
            DriverEvent::Disconnected { client_id } => {
                self.respond_last(client_id, ResponseKind::Success);
            }
            DriverEvent::DisconnectFailed { client_id, error } => {
                warn!("disconnect failed for {}: {}", client_id, error);
                self.respond_last(client_id, ResponseKind::Error(error));
            }
            DriverEvent::QueryResult { client_id, records } => {
                self.respond_last(client_id, ResponseKind::SuccessRecords(records));
            }
            DriverEvent::QueryFailed { client_id, error } => {
                self.respond_last(client_id, ResponseKind::Error(error));
            }
            DriverEvent::ExecuteSqlResult { client_id, count } => {
                self.respond_last(client_id, ResponseKind::SuccessCount(count));
            }
            DriverEvent::ExecuteSqlFailed { client_id, error } => {
                self.respond_last(client_id, ResponseKind::Error(error));
            }
            DriverEvent::ListenStarted { client_id, .. } => {
                self.respond_last(client_id, ResponseKind::Success);
            }
            DriverEvent::ListenFailed { client_id, error } => {
                if let Some(client) = self.clients.get_mut(&client_id) {
                    client.listen_request = None;
                }
                self.respond_last(client_id, ResponseKind::Error(error));
            }
            DriverEvent::InternalUnlistenConnected { client_id, connection_id } => {
                self.connections.on_internal_unlisten_connected(client_id, connection_id);
                if let Some(client) = self.clients.get_mut(&client_id) {
                    client.listen_request = None;
                }
                if let Some(envelope) = self.connections.take_pending_unlisten(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Success);
                }
            }
            DriverEvent::InternalUnlistenConnectFailed { client_id, error } => {
                if let Some(envelope) = self.connections.take_pending_unlisten(client_id) {
                    self.respond(client_id, &envelope, ResponseKind::Error(error));
                }
            }
            DriverEvent::ListenEvent { connection_id, payload } => {
                for client_id in self.connections.clients_bound_to(connection_id) {
                    let envelope = self.clients.get(&client_id).and_then(|c| c.listen_request.clone());
                    if let Some(envelope) = envelope {
                        self.respond(client_id, &envelope, ResponseKind::UnsolicitedNotification(payload.clone()));
                    }
                }
            }
            DriverEvent::ConnectionLost { connection_id, error } => {
                let affected = self.connections.on_connection_lost(connection_id);
                for client_id in affected {
                    let last = self.clients.get(&client_id).and_then(|c| c.last_request.clone());
                    if let Some(last) = last {
                        // Egress contract: a ConnectionLost frame is always
                        // type "connect", regardless of the client's last
                        // request func; only requestId carries over for
                        // correlation.
                        let envelope = Envelope {
                            request_id: last.request_id,
                            func: FuncValue::Known("connect".to_string()),
                            session_id: last.session_id,
                            raw: last.raw,
                        };
                        self.respond(client_id, &envelope, ResponseKind::UnsolicitedConnectionLost(error.clone()));
                    }
                }
            }
        }
    }

    /// Replies using the envelope of the client's most recently dispatched
    /// request — the correlation target for a response arriving later as a
    /// `DriverEvent`.
    fn respond_last(&mut self, client_id: ClientId, kind: ResponseKind) {
        let envelope = self.clients.get(&client_id).and_then(|c| c.last_request.clone());
        if let Some(envelope) = envelope {
            self.respond(client_id, &envelope, kind);
        }
    }

    fn respond(&mut self, client_id: ClientId, envelope: &Envelope, kind: ResponseKind) {
        let Some(client) = self.clients.get(&client_id) else {
            return;
        };
        if !client.running {
            return;
        }
        let text = format_response(&envelope.request_id, &envelope.func, client_id, &kind);
        let send_failed = match self.outbound.get(&client_id) {
            Some(sender) => sender.send(text).is_err(),
            None => false,
        };
        if send_failed {
            if let Some(client) = self.clients.get_mut(&client_id) {
                client.set_fatal_error("Unable to send to client".to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionId;
    use std::sync::Mutex;
    use std::time::Duration;

    struct AllowAll;
    impl Authenticator for AllowAll {
        fn authenticate(&self, session: (), _session_id: &str) -> ((), bool) {
            (session, true)
        }
    }

    struct DenyAll;
    impl Authenticator for DenyAll {
        fn authenticate(&self, session: (), _session_id: &str) -> ((), bool) {
            (session, false)
        }
    }

    #[derive(Default)]
    struct StubDriver {
        connect_calls: Mutex<Vec<ClientId>>,
    }

    impl Driver for StubDriver {
        fn connect(&self, client_id: ClientId, _request: ConnectRequest, _timeout: Duration) {
            self.connect_calls.lock().unwrap().push(client_id);
        }
        fn reconnect_for_unlisten(&self, _client_id: ClientId, _request: ConnectRequest, _timeout: Duration) {}
        fn disconnect(&self, _client_id: ClientId, _connection_id: ConnectionId, _discard: bool) {}
        fn query(&self, _client_id: ClientId, _connection_id: ConnectionId, _sql: String, _record_count: i64) {}
        fn more_query_results(&self, _client_id: ClientId, _connection_id: ConnectionId) {}
        fn execute_sql(&self, _client_id: ClientId, _connection_id: ConnectionId, _sql: String) {}
        fn listen(&self, _client_id: ClientId, _connection_id: ConnectionId, _channel: String) {}
    }

    fn supervisor(authenticator: Arc<dyn Authenticator>) -> (ProxySupervisor, mpsc::UnboundedReceiver<SupervisorMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let driver: Arc<dyn Driver> = Arc::new(StubDriver::default());
        let supervisor = ProxySupervisor::new(ProxySettings::default(), driver, authenticator, tx);
        (supervisor, rx)
    }

    #[test]
    fn invalid_session_is_rejected_without_dispatch() {
        let (mut sup, _rx) = supervisor(Arc::new(DenyAll));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        sup.handle(SupervisorMessage::WsConnected {
            client_id: ClientId::new(),
            outbound: out_tx,
        });
        let client_id = *sup.clients.keys().next().unwrap();
        sup.handle(SupervisorMessage::WsMessage {
            client_id,
            text: r#"{"func":"query","requestId":1,"sessionId":"bad","sql":"SELECT 1","recordCount":1}"#.to_string(),
        });
        let response = out_rx.try_recv().expect("expected a response frame");
        assert!(response.contains("\"success\":false"));
        assert!(response.contains("Invalid session"));
    }

    #[test]
    fn missing_session_id_is_rejected() {
        let (mut sup, _rx) = supervisor(Arc::new(AllowAll));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let client_id = ClientId::new();
        sup.handle(SupervisorMessage::WsConnected { client_id, outbound: out_tx });
        sup.handle(SupervisorMessage::WsMessage {
            client_id,
            text: r#"{"func":"query","requestId":1,"sql":"SELECT 1","recordCount":1}"#.to_string(),
        });
        let response = out_rx.try_recv().expect("expected a response frame");
        assert!(response.contains("Invalid session"));
    }

    #[test]
    fn fatal_error_short_circuits_further_requests() {
        let (mut sup, _rx) = supervisor(Arc::new(AllowAll));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let client_id = ClientId::new();
        sup.handle(SupervisorMessage::WsConnected { client_id, outbound: out_tx });
        // Poison the outbound channel so the next send fails.
        drop(out_rx);
        sup.handle(SupervisorMessage::WsMessage {
            client_id,
            text: r#"{"func":"query","requestId":1,"sessionId":"s","sql":"SELECT 1","recordCount":1}"#.to_string(),
        });
        assert!(sup.clients.get(&client_id).unwrap().fatal_error.is_some());

        let (out_tx2, mut out_rx2) = mpsc::unbounded_channel();
        sup.outbound.insert(client_id, out_tx2);
        sup.handle(SupervisorMessage::WsMessage {
            client_id,
            text: r#"{"func":"query","requestId":2,"sessionId":"s","sql":"SELECT 1","recordCount":1}"#.to_string(),
        });
        let response = out_rx2.try_recv().expect("expected a response frame");
        assert!(response.contains("Unable to send to client"));
    }

    #[test]
    fn stopping_rejects_new_messages() {
        let (mut sup, _rx) = supervisor(Arc::new(AllowAll));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let client_id = ClientId::new();
        sup.handle(SupervisorMessage::WsConnected { client_id, outbound: out_tx });
        sup.handle(SupervisorMessage::Stop);
        sup.handle(SupervisorMessage::WsMessage {
            client_id,
            text: r#"{"func":"query","requestId":1,"sessionId":"s","sql":"SELECT 1","recordCount":1}"#.to_string(),
        });
        assert!(out_rx.try_recv().is_err());
    }

    #[test]
    fn remap_connect_defaults_missing_keys_to_invalid() {
        let mut remap = RemapTables::default();
        remap.host_map.insert("profile-a".to_string(), "db.internal".to_string());
        let connect = ConnectRequest {
            host: "profile-a".to_string(),
            port: 1,
            database: "d".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        };
        let remapped = remap_connect(&remap, connect);
        assert_eq!(remapped.host, "db.internal");
        assert_eq!(remapped.database, "invalid");
        assert_eq!(remapped.port, 0);
    }

    #[test]
    fn remap_passthrough_when_unconfigured() {
        let remap = RemapTables::default();
        let connect = ConnectRequest {
            host: "h".to_string(),
            port: 5432,
            database: "d".to_string(),
            user: "u".to_string(),
            password: "p".to_string(),
        };
        let remapped = remap_connect(&remap, connect.clone());
        assert_eq!(remapped.host, connect.host);
        assert_eq!(remapped.port, connect.port);
    }
}
