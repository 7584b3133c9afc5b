//! WebSocket ingress.
//!
//! Wires the supervisor's message loop to `axum`'s WebSocket upgrade: split
//! the socket into a send half and a receive half, each driven by its own
//! spawned task, joined with `tokio::select!` so neither task can block the
//! other. Both halves only ever push `SupervisorMessage`s or drain an
//! outbound channel — state mutation stays inside `ProxySupervisor::run`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use log::debug;
use tokio::sync::mpsc;

use crate::client::ClientId;
use crate::supervisor::SupervisorMessage;

#[derive(Clone)]
pub struct AppState {
    pub supervisor_tx: mpsc::UnboundedSender<SupervisorMessage>,
}

pub fn router(path: &str, state: AppState) -> Router {
    Router::new().route(path, get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = ClientId::new();
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    if state
        .supervisor_tx
        .send(SupervisorMessage::WsConnected {
            client_id,
            outbound: outbound_tx,
        })
        .is_err()
    {
        debug!("supervisor gone before client {} could register", client_id);
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let supervisor_tx = state.supervisor_tx.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    let _ = supervisor_tx.send(SupervisorMessage::WsMessage {
                        client_id,
                        text: text.to_string(),
                    });
                }
                Ok(Message::Close(_)) | Err(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    let _ = state.supervisor_tx.send(SupervisorMessage::WsDisconnected { client_id });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use crate::config::ProxySettings;
    use crate::db::driver::Driver;
    use crate::db::{ConnectRequest, ConnectionId};
    use crate::supervisor::ProxySupervisor;
    use axum_test::TestServer;
    use std::time::Duration;

    struct NoopDriver;
    impl Driver for NoopDriver {
        fn connect(&self, _client_id: ClientId, _request: ConnectRequest, _timeout: Duration) {}
        fn reconnect_for_unlisten(&self, _client_id: ClientId, _request: ConnectRequest, _timeout: Duration) {}
        fn disconnect(&self, _client_id: ClientId, _connection_id: ConnectionId, _discard: bool) {}
        fn query(&self, _client_id: ClientId, _connection_id: ConnectionId, _sql: String, _record_count: i64) {}
        fn more_query_results(&self, _client_id: ClientId, _connection_id: ConnectionId) {}
        fn execute_sql(&self, _client_id: ClientId, _connection_id: ConnectionId, _sql: String) {}
        fn listen(&self, _client_id: ClientId, _connection_id: ConnectionId, _channel: String) {}
    }

    struct DenyAll;
    impl Authenticator for DenyAll {
        fn authenticate(&self, session: (), _session_id: &str) -> ((), bool) {
            (session, false)
        }
    }

    fn test_app() -> Router {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = ProxySupervisor::new(ProxySettings::default(), Arc::new(NoopDriver), Arc::new(DenyAll), tx.clone());
        tokio::spawn(supervisor.run(rx));
        let _ = tx.send(SupervisorMessage::Start);
        router("/pgproxy", AppState { supervisor_tx: tx })
    }

    #[tokio::test]
    async fn upgrade_then_message_without_session_yields_invalid_session_error() {
        let server = TestServer::new(test_app()).expect("failed to start test server");
        let mut socket = server.get_websocket("/pgproxy").await.into_websocket().await;
        socket
            .send_text(r#"{"func":"query","requestId":1,"sql":"SELECT 1","recordCount":1}"#)
            .await;
        let message = socket.receive_text().await;
        assert!(message.contains("Invalid session"));
        assert!(message.contains(r#""success":false"#));
    }

    struct AllowAll;
    impl Authenticator for AllowAll {
        fn authenticate(&self, session: (), _session_id: &str) -> ((), bool) {
            (session, true)
        }
    }

    fn test_app_allow_all() -> Router {
        let (tx, rx) = mpsc::unbounded_channel();
        let supervisor = ProxySupervisor::new(ProxySettings::default(), Arc::new(NoopDriver), Arc::new(AllowAll), tx.clone());
        tokio::spawn(supervisor.run(rx));
        let _ = tx.send(SupervisorMessage::Start);
        router("/pgproxy", AppState { supervisor_tx: tx })
    }

    #[tokio::test]
    async fn query_without_prior_connect_yields_not_connected_error() {
        let server = TestServer::new(test_app_allow_all()).expect("failed to start test server");
        let mut socket = server.get_websocket("/pgproxy").await.into_websocket().await;
        socket
            .send_text(r#"{"func":"query","requestId":1,"sessionId":"s","sql":"SELECT 1","recordCount":1}"#)
            .await;
        let message = socket.receive_text().await;
        assert!(message.contains("Operation NOT allowed since not connected"));
    }
}
