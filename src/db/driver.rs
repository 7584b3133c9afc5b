//! `SqlxDriver`: the shipped [`Driver`] implementation, backed by `sqlx`'s
//! Postgres pool and `PgListener`.
//!
//! Every `ConnectionId` is backed by its own single-connection pool
//! (`max_connections(1)`) — the proxy, not `sqlx`, is responsible for
//! connection-level sharing (LISTEN), so a general-purpose multi-connection
//! pool would fight that invariant rather than help it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use log::{debug, error, warn};
use serde_json::{Map, Value};
use sqlx::postgres::{PgConnectOptions, PgListener, PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::client::ClientId;
use crate::db::{ConnectRequest, ConnectionId, DriverEvent};

fn connect_options(request: &ConnectRequest) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&request.host)
        .port(request.port)
        .database(&request.database)
        .username(&request.user)
        .password(&request.password)
}

struct ConnEntry {
    pool: PgPool,
    pending_rows: VecDeque<String>,
    last_record_count: i64,
    listen_task: Option<JoinHandle<()>>,
}

/// Backend Postgres driver interface.
/// Every method is fire-and-forget: the outcome is reported later via a
/// [`DriverEvent`] sent on the channel the driver was constructed with,
/// never by blocking the caller.
pub trait Driver: Send + Sync + 'static {
    fn connect(&self, client_id: ClientId, request: ConnectRequest, timeout: Duration);
    fn reconnect_for_unlisten(&self, client_id: ClientId, request: ConnectRequest, timeout: Duration);
    fn disconnect(&self, client_id: ClientId, connection_id: ConnectionId, discard_connection: bool);
    fn query(&self, client_id: ClientId, connection_id: ConnectionId, sql: String, record_count: i64);
    fn more_query_results(&self, client_id: ClientId, connection_id: ConnectionId);
    fn execute_sql(&self, client_id: ClientId, connection_id: ConnectionId, sql: String);
    fn listen(&self, client_id: ClientId, connection_id: ConnectionId, channel: String);
}

pub struct SqlxDriver {
    connections: Arc<Mutex<HashMap<ConnectionId, ConnEntry>>>,
    events: mpsc::UnboundedSender<DriverEvent>,
}

impl SqlxDriver {
    pub fn new(events: mpsc::UnboundedSender<DriverEvent>) -> Self {
        SqlxDriver {
            connections: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    async fn open_pool(request: &ConnectRequest, timeout: Duration) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(timeout)
            .connect_with(connect_options(request))
            .await
    }

}

/// Spawns the background task that drains `PgListener` notifications for one
/// shared LISTEN connection and stores its `JoinHandle` on the owning
/// `ConnEntry` so `disconnect` can abort it later.
fn spawn_listen_task(
    connections: Arc<Mutex<HashMap<ConnectionId, ConnEntry>>>,
    events: mpsc::UnboundedSender<DriverEvent>,
    connection_id: ConnectionId,
    pool: PgPool,
    channel: String,
) {
    let handle = tokio::spawn(async move {
        let mut listener = match PgListener::connect_with(&pool).await {
            Ok(l) => l,
            Err(e) => {
                warn!("listen connection setup failed for {}: {}", connection_id, e);
                return;
            }
        };
        if let Err(e) = listener.listen(&channel).await {
            warn!("LISTEN {} failed on {}: {}", channel, connection_id, e);
            let _ = events.send(DriverEvent::ConnectionLost {
                connection_id,
                error: e.to_string(),
            });
            return;
        }
        let mut stream = listener.into_stream();
        while let Some(item) = stream.next().await {
            match item {
                Ok(notification) => {
                    let _ = events.send(DriverEvent::ListenEvent {
                        connection_id,
                        payload: notification.payload().to_string(),
                    });
                }
                Err(e) => {
                    error!("listen connection {} lost: {}", connection_id, e);
                    let _ = events.send(DriverEvent::ConnectionLost {
                        connection_id,
                        error: e.to_string(),
                    });
                    break;
                }
            }
        }
    });
    tokio::spawn(async move {
        if let Some(entry) = connections.lock().await.get_mut(&connection_id) {
            entry.listen_task = Some(handle);
        }
    });
}

fn stringify_row(row: &PgRow) -> String {
    let mut map = Map::new();
    for (i, column) in row.columns().iter().enumerate() {
        let name = column.name().to_string();
        let value = decode_column(row, i, column.type_info().name());
        map.insert(name, value);
    }
    serde_json::to_string(&Value::Object(map)).unwrap_or_else(|_| "{}".to_string())
}

fn decode_column(row: &PgRow, i: usize, type_name: &str) -> Value {
    match type_name {
        "INT2" | "INT4" => row
            .try_get::<i32, _>(i)
            .map(|v| Value::from(v))
            .unwrap_or(Value::Null),
        "INT8" => row
            .try_get::<i64, _>(i)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => row
            .try_get::<f64, _>(i)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "BOOL" => row
            .try_get::<bool, _>(i)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "UUID" => row
            .try_get::<uuid::Uuid, _>(i)
            .map(|v| Value::from(v.to_string()))
            .unwrap_or(Value::Null),
        "TIMESTAMP" | "TIMESTAMPTZ" => row
            .try_get::<chrono::NaiveDateTime, _>(i)
            .map(|v| Value::from(v.to_string()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<String, _>(i)
            .map(Value::from)
            .unwrap_or(Value::Null),
    }
}

impl Driver for SqlxDriver {
    fn connect(&self, client_id: ClientId, request: ConnectRequest, timeout: Duration) {
        let connections = self.connections.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match SqlxDriver::open_pool(&request, timeout).await {
                Ok(pool) => {
                    let connection_id = ConnectionId::new();
                    connections.lock().await.insert(
                        connection_id,
                        ConnEntry {
                            pool,
                            pending_rows: VecDeque::new(),
                            last_record_count: 0,
                            listen_task: None,
                        },
                    );
                    let _ = events.send(DriverEvent::Connected {
                        client_id,
                        connection_id,
                    });
                }
                Err(e) => {
                    let _ = events.send(DriverEvent::ConnectFailed {
                        client_id,
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn reconnect_for_unlisten(&self, client_id: ClientId, request: ConnectRequest, timeout: Duration) {
        let connections = self.connections.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match SqlxDriver::open_pool(&request, timeout).await {
                Ok(pool) => {
                    let connection_id = ConnectionId::new();
                    connections.lock().await.insert(
                        connection_id,
                        ConnEntry {
                            pool,
                            pending_rows: VecDeque::new(),
                            last_record_count: 0,
                            listen_task: None,
                        },
                    );
                    let _ = events.send(DriverEvent::InternalUnlistenConnected {
                        client_id,
                        connection_id,
                    });
                }
                Err(e) => {
                    let _ = events.send(DriverEvent::InternalUnlistenConnectFailed {
                        client_id,
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn disconnect(&self, client_id: ClientId, connection_id: ConnectionId, discard_connection: bool) {
        let connections = self.connections.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let entry = connections.lock().await.remove(&connection_id);
            if let Some(entry) = entry {
                if let Some(task) = entry.listen_task {
                    task.abort();
                }
                // `discard_connection` is the client's request to drop the
                // backend connection outright rather than return it to a
                // pool; since every ConnectionId already owns a dedicated
                // single-connection pool, both cases close it the same way.
                let _ = discard_connection;
                entry.pool.close().await;
            }
            let _ = events.send(DriverEvent::Disconnected { client_id });
        });
    }

    fn query(&self, client_id: ClientId, connection_id: ConnectionId, sql: String, record_count: i64) {
        let connections = self.connections.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let pool = {
                let guard = connections.lock().await;
                guard.get(&connection_id).map(|e| e.pool.clone())
            };
            let Some(pool) = pool else {
                let _ = events.send(DriverEvent::QueryFailed {
                    client_id,
                    error: "Operation NOT allowed since not connected".to_string(),
                });
                return;
            };
            match sqlx::query(&sql).fetch_all(&pool).await {
                Ok(rows) => {
                    let mut records: VecDeque<String> =
                        rows.iter().map(stringify_row).collect();
                    let take = record_count.max(0) as usize;
                    let first_batch: Vec<String> = records.drain(..take.min(records.len())).collect();
                    let mut guard = connections.lock().await;
                    if let Some(entry) = guard.get_mut(&connection_id) {
                        entry.pending_rows = records;
                        entry.last_record_count = record_count;
                    }
                    drop(guard);
                    let _ = events.send(DriverEvent::QueryResult {
                        client_id,
                        records: first_batch,
                    });
                }
                Err(e) => {
                    let _ = events.send(DriverEvent::QueryFailed {
                        client_id,
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn more_query_results(&self, client_id: ClientId, connection_id: ConnectionId) {
        let connections = self.connections.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut guard = connections.lock().await;
            let Some(entry) = guard.get_mut(&connection_id) else {
                drop(guard);
                let _ = events.send(DriverEvent::QueryFailed {
                    client_id,
                    error: "Operation NOT allowed since not connected".to_string(),
                });
                return;
            };
            let take = entry.last_record_count.max(0) as usize;
            let batch: Vec<String> = entry
                .pending_rows
                .drain(..take.min(entry.pending_rows.len()))
                .collect();
            drop(guard);
            let _ = events.send(DriverEvent::QueryResult {
                client_id,
                records: batch,
            });
        });
    }

    fn execute_sql(&self, client_id: ClientId, connection_id: ConnectionId, sql: String) {
        let connections = self.connections.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let pool = {
                let guard = connections.lock().await;
                guard.get(&connection_id).map(|e| e.pool.clone())
            };
            let Some(pool) = pool else {
                let _ = events.send(DriverEvent::ExecuteSqlFailed {
                    client_id,
                    error: "Operation NOT allowed since not connected".to_string(),
                });
                return;
            };
            match sqlx::query(&sql).execute(&pool).await {
                Ok(result) => {
                    let _ = events.send(DriverEvent::ExecuteSqlResult {
                        client_id,
                        count: result.rows_affected() as i64,
                    });
                }
                Err(e) => {
                    let _ = events.send(DriverEvent::ExecuteSqlFailed {
                        client_id,
                        error: e.to_string(),
                    });
                }
            }
        });
    }

    fn listen(&self, client_id: ClientId, connection_id: ConnectionId, channel: String) {
        let connections = self.connections.clone();
        let events = self.events.clone();
        let driver_connections = self.connections.clone();
        tokio::spawn(async move {
            let pool = {
                let guard = connections.lock().await;
                guard.get(&connection_id).map(|e| e.pool.clone())
            };
            let Some(pool) = pool else {
                let _ = events.send(DriverEvent::ListenFailed {
                    client_id,
                    error: "Operation NOT allowed since not connected".to_string(),
                });
                return;
            };
            debug!("starting LISTEN {} on connection {}", channel, connection_id);
            spawn_listen_task(driver_connections, events.clone(), connection_id, pool, channel);
            let _ = events.send(DriverEvent::ListenStarted {
                client_id,
                connection_id,
            });
        });
    }
}
