//! Proxy configuration surface.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

pub const DEFAULT_WS_HOST: &str = "127.0.0.1";
pub const DEFAULT_WS_PORT: u16 = 8080;
pub const DEFAULT_PATH: &str = "/pgproxy";

#[derive(Debug, Clone, Deserialize)]
pub struct RemapTables {
    #[serde(default)]
    pub host_map: HashMap<String, String>,
    #[serde(default)]
    pub port_map: HashMap<String, u16>,
    #[serde(default)]
    pub database_map: HashMap<String, String>,
    #[serde(default)]
    pub user_map: HashMap<String, String>,
    #[serde(default)]
    pub password_map: HashMap<String, String>,
}

impl Default for RemapTables {
    fn default() -> Self {
        RemapTables {
            host_map: HashMap::new(),
            port_map: HashMap::new(),
            database_map: HashMap::new(),
            user_map: HashMap::new(),
            password_map: HashMap::new(),
        }
    }
}

/// Raw, directly-deserializable shape of the config file. Durations are
/// expressed in seconds on the wire and converted to `Duration` in
/// `ProxySettings::load`.
#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    ws_port: u16,
    #[serde(default = "default_path")]
    path: String,
    #[serde(default)]
    ws_host: Option<String>,
    #[serde(default = "default_pg_connect_timeout_secs")]
    pg_connect_timeout_secs: u64,
    #[serde(default = "default_delay_before_stop_secs")]
    delay_before_stop_secs: u64,
    #[serde(default = "default_gc_period_secs")]
    garbage_collect_disconnected_clients_after_seconds: u64,
    #[serde(default = "default_idle_dump_state_frequency_secs")]
    idle_dump_state_frequency_seconds: u64,
    #[serde(default)]
    debug: bool,
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default)]
    remap: RemapTables,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}
fn default_pg_connect_timeout_secs() -> u64 {
    10
}
fn default_delay_before_stop_secs() -> u64 {
    5
}
fn default_gc_period_secs() -> u64 {
    30
}
fn default_idle_dump_state_frequency_secs() -> u64 {
    300
}

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub ws_host: String,
    pub ws_port: u16,
    pub path: String,
    pub pg_connect_timeout: Duration,
    pub delay_before_stop: Duration,
    pub garbage_collect_disconnected_clients_after_period: Duration,
    pub idle_dump_state_frequency: Duration,
    pub debug: bool,
    pub jwt_secret: String,
    pub remap: RemapTables,
}

impl Default for ProxySettings {
    fn default() -> Self {
        ProxySettings {
            ws_host: DEFAULT_WS_HOST.to_string(),
            ws_port: DEFAULT_WS_PORT,
            path: DEFAULT_PATH.to_string(),
            pg_connect_timeout: Duration::from_secs(default_pg_connect_timeout_secs()),
            delay_before_stop: Duration::from_secs(default_delay_before_stop_secs()),
            garbage_collect_disconnected_clients_after_period: Duration::from_secs(
                default_gc_period_secs(),
            ),
            idle_dump_state_frequency: Duration::from_secs(
                default_idle_dump_state_frequency_secs(),
            ),
            debug: false,
            jwt_secret: "change-me".to_string(),
            remap: RemapTables::default(),
        }
    }
}

impl ProxySettings {
    /// Loads settings from `<flavor>.toml` (see `config::flavor`), overridden
    /// by any `PGPROXY__*` environment variables.
    pub fn load(file_stem: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::new(file_stem, FileFormat::Toml).required(false))
            .add_source(Environment::with_prefix("PGPROXY").separator("__"))
            .build()?;

        let raw: RawSettings = builder.try_deserialize()?;
        Ok(ProxySettings {
            ws_host: raw.ws_host.unwrap_or_else(|| DEFAULT_WS_HOST.to_string()),
            ws_port: raw.ws_port,
            path: raw.path,
            pg_connect_timeout: Duration::from_secs(raw.pg_connect_timeout_secs),
            delay_before_stop: Duration::from_secs(raw.delay_before_stop_secs),
            garbage_collect_disconnected_clients_after_period: Duration::from_secs(
                raw.garbage_collect_disconnected_clients_after_seconds,
            ),
            idle_dump_state_frequency: Duration::from_secs(
                raw.idle_dump_state_frequency_seconds,
            ),
            debug: raw.debug,
            jwt_secret: raw.jwt_secret.unwrap_or_else(|| "change-me".to_string()),
            remap: raw.remap,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let settings = ProxySettings::default();
        assert_eq!(settings.ws_port, DEFAULT_WS_PORT);
        assert_eq!(settings.path, DEFAULT_PATH);
        assert!(!settings.debug);
    }
}
