//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection parameters for the MySQL server.
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Character set and collation applied to created objects.
    #[serde(default)]
    pub schema: SchemaSettings,
}

/// Connection parameters for one run.
///
/// `database` is absent during bootstrap, when the session must connect to the
/// server without selecting a schema.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    #[serde(default)]
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Target database name.
    #[serde(default)]
    pub database: Option<String>,

    /// TLS mode: disable, require, verify-ca, verify-full (default: disable).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Seconds to wait for the initial handshake (default: 10).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_mysql_port(),
            user: String::new(),
            password: String::new(),
            database: None,
            ssl_mode: default_ssl_mode(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl ConnectionConfig {
    /// Copy of this config with no database selected, for bootstrap sessions.
    pub fn without_database(&self) -> Self {
        Self {
            database: None,
            ..self.clone()
        }
    }

    /// `host:port` for diagnostics.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True for loopback hosts.
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "localhost" | "127.0.0.1" | "::1")
    }
}

/// Character set and collation for the database and its tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSettings {
    /// Character set (default: utf8mb4).
    #[serde(default = "default_charset")]
    pub charset: String,

    /// Collation (default: utf8mb4_unicode_ci).
    #[serde(default = "default_collation")]
    pub collation: String,
}

impl Default for SchemaSettings {
    fn default() -> Self {
        Self {
            charset: default_charset(),
            collation: default_collation(),
        }
    }
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_charset() -> String {
    "utf8mb4".to_string()
}

fn default_collation() -> String {
    "utf8mb4_unicode_ci".to_string()
}
