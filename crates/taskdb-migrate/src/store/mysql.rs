//! MySQL session backed by a single `mysql_async` connection.

use std::time::Duration;

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Opts, OptsBuilder, SslOpts};
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, SchemaSettings};
use crate::ddl::Statement;
use crate::dialect::MysqlDialect;
use crate::error::{MigrateError, Result};
use crate::schema::ColumnInfo;
use crate::store::SchemaStore;

const LIST_TABLES_SQL: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
"#;

// CAST to CHAR to handle collation differences where information_schema
// reports names as binary strings
const LIST_COLUMNS_SQL: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME,
        CAST(COLUMN_TYPE AS CHAR(1024)) AS COLUMN_TYPE,
        CAST(IS_NULLABLE AS CHAR(3)) AS IS_NULLABLE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

/// One MySQL session.
///
/// Owns its connection exclusively. [`MysqlStore::close`] is idempotent; a
/// store that is dropped without being closed still releases the socket, but
/// without waiting for the server to acknowledge.
pub struct MysqlStore {
    conn: Option<Conn>,
    dialect: MysqlDialect,
    host: String,
    port: u16,
    user: String,
    database: Option<String>,
}

impl MysqlStore {
    /// Open a session. With no `database` in the config, the session is
    /// connected to the server only.
    pub async fn connect(config: &ConnectionConfig, settings: &SchemaSettings) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => None,
            "require" => Some(
                SslOpts::default()
                    .with_danger_accept_invalid_certs(true)
                    .with_danger_skip_domain_validation(true),
            ),
            "verify-ca" => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
            "verify-full" => Some(SslOpts::default()),
            other => {
                return Err(MigrateError::Config(format!(
                    "unknown ssl_mode '{}'",
                    other
                )))
            }
        };
        if ssl_opts.is_none() && !config.is_local() {
            warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
        }

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(config.database.clone())
            .prefer_socket(false)
            .init(vec![format!("SET NAMES {}", settings.charset)]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let opts: Opts = builder.into();
        let timeout = Duration::from_secs(config.connect_timeout_secs);

        let conn = match tokio::time::timeout(timeout, Conn::new(opts)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                return Err(classify_connect_error(e, config))
            }
            Err(_) => {
                return Err(MigrateError::Connectivity {
                    host: config.host.clone(),
                    port: config.port,
                    message: format!("connection timed out after {}s", config.connect_timeout_secs),
                })
            }
        };

        match &config.database {
            Some(db) => info!(
                "Connected to MySQL: {}:{}/{}",
                config.host, config.port, db
            ),
            None => info!(
                "Connected to MySQL: {}:{} (no database selected)",
                config.host, config.port
            ),
        }

        Ok(Self {
            conn: Some(conn),
            dialect: MysqlDialect::new(settings),
            host: config.host.clone(),
            port: config.port,
            user: config.user.clone(),
            database: config.database.clone(),
        })
    }

    fn conn(&mut self) -> Result<&mut Conn> {
        let (host, port) = (self.host.clone(), self.port);
        self.conn.as_mut().ok_or(MigrateError::Connectivity {
            host,
            port,
            message: "connection already closed".into(),
        })
    }

    fn classify(&self, err: mysql_async::Error) -> MigrateError {
        match err {
            mysql_async::Error::Server(e) => {
                MigrateError::from_server(e.code, e.message, &self.user, self.database.as_deref())
            }
            mysql_async::Error::Io(e) => MigrateError::Connectivity {
                host: self.host.clone(),
                port: self.port,
                message: e.to_string(),
            },
            other => MigrateError::Store {
                code: 0,
                message: other.to_string(),
            },
        }
    }

    /// Round-trip `SELECT 1`.
    pub async fn ping(&mut self) -> Result<()> {
        let result = self.conn()?.query_drop("SELECT 1").await;
        result.map_err(|e| self.classify(e))
    }

    /// Server version string.
    pub async fn server_version(&mut self) -> Result<String> {
        let result: std::result::Result<Option<String>, _> =
            self.conn()?.query_first("SELECT VERSION()").await;
        let version = result.map_err(|e| self.classify(e))?;
        Ok(version.unwrap_or_default())
    }

    /// Release the connection. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            match conn.disconnect().await {
                Ok(()) => debug!("Closed MySQL connection to {}:{}", self.host, self.port),
                Err(e) => warn!("Error while closing MySQL connection: {}", e),
            }
        }
    }
}

#[async_trait]
impl SchemaStore for MysqlStore {
    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        let result: std::result::Result<Vec<String>, _> =
            self.conn()?.query(LIST_TABLES_SQL).await;
        result.map_err(|e| self.classify(e))
    }

    async fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let result: std::result::Result<Vec<(String, String, String)>, _> =
            self.conn()?.exec(LIST_COLUMNS_SQL, (table,)).await;
        let rows = result.map_err(|e| self.classify(e))?;

        Ok(rows
            .into_iter()
            .map(|(name, data_type, nullable)| ColumnInfo {
                name,
                data_type,
                is_nullable: nullable.eq_ignore_ascii_case("YES"),
            })
            .collect())
    }

    async fn count_rows(&mut self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", MysqlDialect::quote_ident(table));
        let result: std::result::Result<Option<u64>, _> = self.conn()?.query_first(&sql).await;
        let count = result.map_err(|e| self.classify(e))?;
        Ok(count.unwrap_or(0))
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let sql = self.dialect.render(statement);
        debug!("SQL: {}", sql);

        let conn = self.conn()?;
        let result = conn.query_drop(&sql).await;
        let affected = conn.affected_rows();
        result.map_err(|e| self.classify(e))?;

        if let Statement::UseDatabase(name) = statement {
            self.database = Some(name.clone());
        }
        Ok(affected)
    }

    fn backend_type(&self) -> &'static str {
        "mysql"
    }
}

/// Classify a connect-time error, before a store exists.
fn classify_connect_error(err: mysql_async::Error, config: &ConnectionConfig) -> MigrateError {
    match err {
        mysql_async::Error::Server(e) => {
            MigrateError::from_server(e.code, e.message, &config.user, config.database.as_deref())
        }
        mysql_async::Error::Io(e) => MigrateError::Connectivity {
            host: config.host.clone(),
            port: config.port,
            message: e.to_string(),
        },
        other => MigrateError::Connectivity {
            host: config.host.clone(),
            port: config.port,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection_is_connectivity_error() {
        // Port 1 is reserved (tcpmux) and closed on any sane test host
        let config = ConnectionConfig {
            host: "127.0.0.1".into(),
            port: 1,
            user: "taskapp".into(),
            password: "secret".into(),
            database: Some("taskdb".into()),
            connect_timeout_secs: 5,
            ..Default::default()
        };

        let err = match MysqlStore::connect(&config, &SchemaSettings::default()).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(e) => e,
        };
        match err {
            MigrateError::Connectivity { host, port, .. } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
