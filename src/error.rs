//! Crate-wide error type for fallible boundaries (config load, pool setup,
//! unrecoverable state-machine inconsistencies).
//!
//! Per-request failures (a bad `query`, a rejected `connect`) are *not*
//! represented here — those are data that travels back to the client as a
//! `success:false` response, not a Rust error. See `protocol::response`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to bind websocket listener on {0}: {1}")]
    Bind(String, #[source] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}
