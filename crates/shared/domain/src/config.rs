use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level bridge configuration, as read from `config.yaml`.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfigInner {
    pub bridge: BridgeSettings,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(flatten, default)]
    inner: Arc<BridgeConfigInner>,
}

impl Deref for BridgeConfig {
    type Target = BridgeConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for BridgeConfig {
    fn deref_mut(&mut self) -> &mut BridgeConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Where the appservice listens and which homeserver it belongs to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSettings {
    /// Server name of the homeserver (e.g. `example.org`).
    pub domain: String,
    /// Client-server API base URL of the homeserver.
    pub homeserver_url: String,
    /// Listen port; the `--port` CLI flag takes precedence.
    pub port: Option<u16>,
    pub bind_address: IpAddr,
}

/// Deprecated storage-path keys, each with every spelling that is still recognized.
pub const LEGACY_STORAGE_KEYS: [(&str, [&str; 3]); 2] = [
    ("user_store_path", ["user_store_path", "userStorePath", "userstorepath"]),
    ("room_store_path", ["room_store_path", "roomStorePath", "roomstorepath"]),
];

/// `SurrealDB` connection descriptors.
///
/// `user_store_path` / `room_store_path` belong to the retired file-backed stores.
/// They are only parsed so that their presence can be rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub credentials: Option<DatabaseCredentials>,
    #[serde(alias = "userStorePath", alias = "userstorepath")]
    pub user_store_path: Option<String>,
    #[serde(alias = "roomStorePath", alias = "roomstorepath")]
    pub room_store_path: Option<String>,
}

impl DatabaseConfig {
    /// Names of the deprecated storage-path keys that carry a value.
    ///
    /// A key written with an empty value deserializes to `None`; check the raw
    /// document as well to catch those.
    #[must_use]
    pub fn legacy_keys(&self) -> Vec<&'static str> {
        let [(user, _), (room, _)] = LEGACY_STORAGE_KEYS;
        [(user, &self.user_store_path), (room, &self.room_store_path)]
            .into_iter()
            .filter_map(|(name, value)| value.is_some().then_some(name))
            .collect()
    }
}

/// Root credentials (optional for unauthenticated engines like `mem://`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
}

/// Logging sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    pub console: bool,
    /// Directory for rolling log files; console only when absent.
    pub path: Option<PathBuf>,
    pub json: bool,
    /// Extra env-filter directives, e.g. `mxd_appservice=debug`.
    pub filter: Option<String>,
}

/// Prometheus collector settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enable: bool,
    /// Route the collector is served on, relative to the appservice listener.
    pub path: String,
}

// --- Default ---

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            domain: "localhost".to_owned(),
            homeserver_url: "http://localhost:8008".to_owned(),
            port: None,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "mem://".to_owned(),
            namespace: "discord".to_owned(),
            database: "bridge".to_owned(),
            credentials: None,
            user_store_path: None,
            room_store_path: None,
        }
    }
}

impl Default for DatabaseCredentials {
    fn default() -> Self {
        Self { username: "root".to_owned(), password: "root".to_owned() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), console: true, path: None, json: false, filter: None }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enable: false, path: "/metrics".to_owned() }
    }
}
