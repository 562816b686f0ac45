//! Configuration validation.

use tracing::warn;

use super::{Config, ConnectionConfig};
use crate::error::{MigrateError, Result};

const SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

/// Validate the configuration.
///
/// `needs_database` is false only for operations that may talk to the server
/// alone, such as a health check.
pub fn validate(config: &Config, needs_database: bool) -> Result<()> {
    let conn = &config.connection;

    if conn.host.is_empty() {
        return Err(MigrateError::Config(
            "database host is required (DB_HOST or --host)".into(),
        ));
    }
    if conn.port == 0 {
        return Err(MigrateError::Config("database port must be non-zero".into()));
    }
    if conn.user.is_empty() {
        return Err(MigrateError::Config(
            "database user is required (DB_USER or --user)".into(),
        ));
    }

    match conn.database.as_deref() {
        Some(name) => check_name("database name", name)?,
        None if needs_database => {
            return Err(MigrateError::Config(
                "database name is required (DB_NAME or --database)".into(),
            ));
        }
        None => {}
    }

    if !SSL_MODES.contains(&conn.ssl_mode.to_lowercase().as_str()) {
        return Err(MigrateError::Config(format!(
            "ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            conn.ssl_mode
        )));
    }
    if conn.connect_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "connect_timeout_secs must be at least 1".into(),
        ));
    }

    check_name("charset", &config.schema.charset)?;
    check_name("collation", &config.schema.collation)?;

    if let Some(message) = password_warning(conn) {
        warn!("{}", message);
    }

    Ok(())
}

/// An empty password is accepted, but only expected on a loopback server.
fn password_warning(conn: &ConnectionConfig) -> Option<String> {
    (conn.password.is_empty() && !conn.is_local()).then(|| {
        format!(
            "No password configured for user '{}' on non-local host {}",
            conn.user,
            conn.address()
        )
    })
}

/// Names that end up inside DDL must be plain identifiers.
fn check_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(format!("{} must not be empty", what)));
    }
    if name.len() > 64 {
        return Err(MigrateError::Config(format!(
            "{} '{}' exceeds 64 characters",
            what, name
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    {
        return Err(MigrateError::Config(format!(
            "{} '{}' may only contain letters, digits, '_' and '$'",
            what, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, SchemaSettings};

    fn valid_config() -> Config {
        Config {
            connection: ConnectionConfig {
                host: "localhost".to_string(),
                port: 3306,
                user: "taskapp".to_string(),
                password: "password".to_string(),
                database: Some("taskdb".to_string()),
                ..Default::default()
            },
            schema: SchemaSettings::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config(), true).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.connection.host = "".to_string();
        assert!(validate(&config, true).is_err());
    }

    #[test]
    fn test_missing_user() {
        let mut config = valid_config();
        config.connection.user = "".to_string();
        let err = validate(&config, true).unwrap_err();
        assert!(err.to_string().contains("DB_USER"));
    }

    #[test]
    fn test_database_optional_for_bootstrap_only() {
        let mut config = valid_config();
        config.connection.database = None;
        assert!(validate(&config, false).is_ok());
        assert!(validate(&config, true).is_err());
    }

    #[test]
    fn test_database_name_rejects_quotes() {
        let mut config = valid_config();
        config.connection.database = Some("task`db".to_string());
        assert!(validate(&config, true).is_err());
    }

    #[test]
    fn test_empty_password_warns_on_remote_host() {
        let mut config = valid_config();
        config.connection.password = String::new();
        assert!(password_warning(&config.connection).is_none());

        config.connection.host = "db.internal".to_string();
        let message = password_warning(&config.connection).unwrap();
        assert!(message.contains("db.internal:3306"));
        assert!(validate(&config, true).is_ok());

        config.connection.password = "password".to_string();
        assert!(password_warning(&config.connection).is_none());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.connection.ssl_mode = "sometimes".to_string();
        assert!(validate(&config, true).is_err());
    }

    #[test]
    fn test_collation_must_be_identifier() {
        let mut config = valid_config();
        config.schema.collation = "utf8mb4; DROP".to_string();
        assert!(validate(&config, true).is_err());
    }

    #[test]
    fn test_connection_config_debug_redacts_password() {
        let mut config = valid_config();
        config.connection.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.connection);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
