//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// Not validated here: environment and command-line overrides are applied
    /// on top before [`Config::validate`] runs.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Build configuration from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay `DB_*` variables on top of the current values.
    pub fn apply_env(&mut self) -> Result<()> {
        dotenvy::dotenv().ok();
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let conn = &mut self.connection;
        if let Some(host) = lookup("DB_HOST") {
            conn.host = host;
        }
        if let Some(port) = lookup("DB_PORT") {
            conn.port = port.trim().parse().map_err(|_| {
                MigrateError::Config(format!("DB_PORT must be a valid port number, got '{}'", port))
            })?;
        }
        if let Some(user) = lookup("DB_USER") {
            conn.user = user;
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            conn.password = password;
        }
        if let Some(name) = lookup("DB_NAME") {
            conn.database = Some(name).filter(|n| !n.is_empty());
        }
        if let Some(mode) = lookup("DB_SSL_MODE") {
            conn.ssl_mode = mode;
        }
        if let Some(charset) = lookup("DB_CHARSET") {
            self.schema.charset = charset;
        }
        if let Some(collation) = lookup("DB_COLLATION") {
            self.schema.collation = collation;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self, needs_database: bool) -> Result<()> {
        validation::validate(self, needs_database)
    }

    /// The configured database name, or a configuration error.
    pub fn database(&self) -> Result<&str> {
        self.connection
            .database
            .as_deref()
            .ok_or_else(|| MigrateError::Config("database name is required".into()))
    }
}
