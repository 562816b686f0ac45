//! Error types for the migration engine.

use thiserror::Error;

/// MySQL server error codes the engine classifies explicitly.
pub mod codes {
    pub const DB_ACCESS_DENIED: u16 = 1044;
    pub const ACCESS_DENIED: u16 = 1045;
    pub const UNKNOWN_DATABASE: u16 = 1049;
    pub const TABLE_EXISTS: u16 = 1050;
    pub const UNKNOWN_COLUMN: u16 = 1054;
    pub const DUPLICATE_COLUMN: u16 = 1060;
    pub const DUPLICATE_KEY_NAME: u16 = 1061;
    pub const CANT_DROP_FIELD_OR_KEY: u16 = 1091;
    pub const TABLE_ACCESS_DENIED: u16 = 1142;
    pub const COLUMN_ACCESS_DENIED: u16 = 1143;
    pub const NO_SUCH_TABLE: u16 = 1146;
    pub const SPECIFIC_ACCESS_DENIED: u16 = 1227;
    pub const NO_REFERENCED_ROW: u16 = 1452;
    pub const FK_NO_INDEX_PARENT: u16 = 1824;
    pub const FK_DUP_NAME: u16 = 1826;
    pub const FK_CANNOT_DROP_PARENT: u16 = 3730;
}

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing values, invalid names, bad YAML shape)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Store unreachable (wrong host/port, server down, connect timeout)
    #[error("Cannot reach database server at {host}:{port}: {message}")]
    Connectivity {
        host: String,
        port: u16,
        message: String,
    },

    /// Credentials rejected or privilege missing for the requested statement
    #[error("Access denied for user '{user}' (error {code}): {message}")]
    Authorization {
        user: String,
        code: u16,
        message: String,
    },

    /// Target database does not exist
    #[error("Unknown database '{database}' (error {code}) - run `create-db` first")]
    UnknownDatabase { database: String, code: u16 },

    /// A statement collided with schema state the precondition did not see
    #[error("Schema conflict (error {code}): {message}")]
    SchemaConflict { code: u16, message: String },

    /// Any other engine-reported error, surfaced verbatim
    #[error("Database error {code}: {message}")]
    Store { code: u16, message: String },

    /// Failure inside a migration step
    #[error("Step '{step}' failed")]
    Step {
        step: String,
        #[source]
        source: Box<MigrateError>,
    },

    /// A step's verification or guard did not hold
    #[error("Verification failed for step '{step}': {message}")]
    Verification { step: String, message: String },

    /// Run was interrupted between steps (SIGINT, SIGTERM)
    #[error("Migration cancelled")]
    Cancelled,

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Classify a server-reported error code.
    ///
    /// `user` and `database` are the identity and target of the session that
    /// received the error; they are only used to fill in the diagnostic.
    pub fn from_server(
        code: u16,
        message: impl Into<String>,
        user: &str,
        database: Option<&str>,
    ) -> Self {
        let message = message.into();
        match code {
            codes::DB_ACCESS_DENIED
            | codes::ACCESS_DENIED
            | codes::TABLE_ACCESS_DENIED
            | codes::COLUMN_ACCESS_DENIED
            | codes::SPECIFIC_ACCESS_DENIED => MigrateError::Authorization {
                user: user.to_string(),
                code,
                message,
            },
            codes::UNKNOWN_DATABASE => MigrateError::UnknownDatabase {
                database: database
                    .map(str::to_string)
                    .unwrap_or_else(|| quoted_name(&message).unwrap_or_default()),
                code,
            },
            codes::TABLE_EXISTS
            | codes::DUPLICATE_COLUMN
            | codes::DUPLICATE_KEY_NAME
            | codes::CANT_DROP_FIELD_OR_KEY
            | codes::FK_DUP_NAME => MigrateError::SchemaConflict { code, message },
            _ => MigrateError::Store { code, message },
        }
    }

    /// Wrap an error with the identifier of the step that produced it.
    pub fn in_step(self, step: impl Into<String>) -> Self {
        match self {
            // Already attributed, keep the innermost step
            MigrateError::Step { .. } | MigrateError::Verification { .. } => self,
            MigrateError::Cancelled => self,
            other => MigrateError::Step {
                step: step.into(),
                source: Box::new(other),
            },
        }
    }

    /// Identifier of the failing step, if the error is attributed to one.
    pub fn step(&self) -> Option<&str> {
        match self {
            MigrateError::Step { step, .. } | MigrateError::Verification { step, .. } => {
                Some(step)
            }
            _ => None,
        }
    }

    /// The innermost error, unwrapping step attribution.
    pub fn root(&self) -> &MigrateError {
        match self {
            MigrateError::Step { source, .. } => source.root(),
            other => other,
        }
    }

    /// Engine error code, if the store reported one.
    pub fn code(&self) -> Option<u16> {
        match self.root() {
            MigrateError::Authorization { code, .. }
            | MigrateError::UnknownDatabase { code, .. }
            | MigrateError::SchemaConflict { code, .. }
            | MigrateError::Store { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for the "column does not exist" class of errors.
    pub fn is_unknown_column(&self) -> bool {
        self.code() == Some(codes::UNKNOWN_COLUMN)
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self.root() {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => 1,
            MigrateError::Connectivity { .. } => 2,
            MigrateError::Authorization { .. } => 3,
            MigrateError::UnknownDatabase { .. } => 4,
            MigrateError::SchemaConflict { .. } => 5,
            MigrateError::Store { .. } => 6,
            MigrateError::Io(_) => 7,
            MigrateError::Verification { .. } => 8,
            MigrateError::Cancelled => 130,
            MigrateError::Step { .. } => 6,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Extract the first single-quoted name from a server message.
fn quoted_name(message: &str) -> Option<String> {
    let start = message.find('\'')? + 1;
    let len = message[start..].find('\'')?;
    Some(message[start..start + len].to_string())
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_denied_is_authorization() {
        let err = MigrateError::from_server(
            codes::ACCESS_DENIED,
            "Access denied for user 'app'@'localhost' (using password: YES)",
            "app",
            Some("taskdb"),
        );
        assert!(matches!(err, MigrateError::Authorization { ref user, .. } if user == "app"));
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_unknown_database_suggests_bootstrap() {
        let err = MigrateError::from_server(
            codes::UNKNOWN_DATABASE,
            "Unknown database 'taskdb'",
            "app",
            None,
        );
        match &err {
            MigrateError::UnknownDatabase { database, .. } => assert_eq!(database, "taskdb"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.to_string().contains("create-db"));
        assert_eq!(err.code(), Some(codes::UNKNOWN_DATABASE));
    }

    #[test]
    fn test_privilege_failure_keeps_server_code() {
        let err = MigrateError::from_server(
            codes::TABLE_ACCESS_DENIED,
            "ALTER command denied to user 'app'@'localhost' for table 'users'",
            "app",
            Some("taskdb"),
        )
        .in_step("users.add_profile_columns");

        assert_eq!(err.code(), Some(codes::TABLE_ACCESS_DENIED));
        assert_eq!(err.exit_code(), 3);
        assert!(err.format_detailed().contains("1142"));
    }

    #[test]
    fn test_duplicate_column_is_conflict() {
        let err = MigrateError::from_server(
            codes::DUPLICATE_COLUMN,
            "Duplicate column name 'bio'",
            "app",
            Some("taskdb"),
        );
        assert!(matches!(err, MigrateError::SchemaConflict { code: 1060, .. }));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_other_codes_are_verbatim() {
        let err = MigrateError::from_server(1205, "Lock wait timeout exceeded", "app", None);
        assert_eq!(err.to_string(), "Database error 1205: Lock wait timeout exceeded");
    }

    #[test]
    fn test_step_wrapping_keeps_innermost() {
        let err = MigrateError::Store {
            code: codes::UNKNOWN_COLUMN,
            message: "Unknown column 'x'".into(),
        }
        .in_step("users.add_profile_columns")
        .in_step("outer");

        assert_eq!(err.step(), Some("users.add_profile_columns"));
        assert!(err.is_unknown_column());
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_format_detailed_includes_cause() {
        let err = MigrateError::Store {
            code: 1146,
            message: "Table 'taskdb.subtasks' doesn't exist".into(),
        }
        .in_step("subtasks.backfill_is_completed");

        let detailed = err.format_detailed();
        assert!(detailed.contains("subtasks.backfill_is_completed"));
        assert!(detailed.contains("Caused by:"));
        assert!(detailed.contains("1146"));
    }
}
