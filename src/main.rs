mod auth;
mod client;
mod config;
mod connection_manager;
mod db;
mod error;
mod protocol;
mod supervisor;
mod ws_server;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::auth::{Authenticator, JwtAuthenticator};
use crate::config::flavor::config_file_stem;
use crate::config::logger::Logger;
use crate::config::ProxySettings;
use crate::db::driver::SqlxDriver;
use crate::db::DriverEvent;
use crate::error::ProxyError;
use crate::supervisor::{ProxySupervisor, SupervisorMessage};
use crate::ws_server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Logger::init();

    let settings = ProxySettings::load(&config_file_stem()).map_err(ProxyError::Config)?;
    let bind_addr = format!("{}:{}", settings.ws_host, settings.ws_port);
    let path = settings.path.clone();

    let (supervisor_tx, supervisor_rx) = mpsc::unbounded_channel::<SupervisorMessage>();
    let (driver_events_tx, mut driver_events_rx) = mpsc::unbounded_channel::<DriverEvent>();

    let driver = Arc::new(SqlxDriver::new(driver_events_tx));
    let authenticator: Arc<dyn Authenticator> = Arc::new(JwtAuthenticator::new(settings.jwt_secret.clone()));
    let supervisor = ProxySupervisor::new(settings, driver, authenticator, supervisor_tx.clone());

    // Fold DriverEvents back into the supervisor's single message loop rather
    // than letting SqlxDriver's background tasks touch supervisor state.
    let forward_tx = supervisor_tx.clone();
    tokio::spawn(async move {
        while let Some(event) = driver_events_rx.recv().await {
            if forward_tx.send(SupervisorMessage::Driver(event)).is_err() {
                break;
            }
        }
    });

    let tick_tx = supervisor_tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        loop {
            interval.tick().await;
            if tick_tx.send(SupervisorMessage::Tick).is_err() {
                break;
            }
        }
    });

    let supervisor_task = tokio::spawn(supervisor.run(supervisor_rx));
    let _ = supervisor_tx.send(SupervisorMessage::Start);

    let app_state = AppState {
        supervisor_tx: supervisor_tx.clone(),
    };
    let app = ws_server::router(&path, app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| ProxyError::Bind(bind_addr.clone(), e))?;
    log::info!("pgproxy listening on {}{}", bind_addr, path);

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let _ = supervisor_tx.send(SupervisorMessage::Stop);
    let _ = supervisor_task.await;

    serve_result?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
