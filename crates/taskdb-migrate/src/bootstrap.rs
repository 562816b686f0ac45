//! Database creation, run on a session with no database selected.

use serde::Serialize;
use tracing::info;

use crate::config::SchemaSettings;
use crate::ddl::{DdlExecutor, Statement};
use crate::error::Result;
use crate::store::SchemaStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub database: String,
    pub charset: String,
    pub collation: String,
}

/// Creates the target database and pins its character set.
///
/// The charset and collation are applied on every run, including when the
/// database already exists, so a database first created under a legacy
/// server default is corrected.
pub struct DatabaseBootstrap<'a> {
    store: &'a mut dyn SchemaStore,
    settings: SchemaSettings,
}

impl<'a> DatabaseBootstrap<'a> {
    pub fn new(store: &'a mut dyn SchemaStore, settings: &SchemaSettings) -> Self {
        Self {
            store,
            settings: settings.clone(),
        }
    }

    /// Create `database` if needed, set its charset and select it.
    pub async fn bootstrap(&mut self, database: &str) -> Result<BootstrapReport> {
        let charset = self.settings.charset.clone();
        let collation = self.settings.collation.clone();

        let statements = [
            Statement::CreateDatabase {
                name: database.to_string(),
                charset: charset.clone(),
                collation: collation.clone(),
            },
            Statement::AlterDatabaseCharset {
                name: database.to_string(),
                charset: charset.clone(),
                collation: collation.clone(),
            },
            Statement::UseDatabase(database.to_string()),
        ];
        DdlExecutor::new(&mut *self.store)
            .execute_all(&statements)
            .await?;

        info!(
            "Database {} ready ({} / {})",
            database, charset, collation
        );
        Ok(BootstrapReport {
            database: database.to_string(),
            charset,
            collation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_creates_and_selects() {
        let mut store = MemoryStore::new();
        let report = DatabaseBootstrap::new(&mut store, &SchemaSettings::default())
            .bootstrap("taskdb")
            .await
            .unwrap();

        assert_eq!(report.charset, "utf8mb4");
        assert!(store.has_database("taskdb"));
        assert_eq!(store.database(), Some("taskdb"));
    }

    #[tokio::test]
    async fn test_existing_database_gets_charset_reapplied() {
        let mut store = MemoryStore::with_database("taskdb");
        assert_eq!(
            store.database_charset("taskdb").unwrap().0,
            "latin1"
        );

        DatabaseBootstrap::new(&mut store, &SchemaSettings::default())
            .bootstrap("taskdb")
            .await
            .unwrap();

        assert_eq!(
            store.database_charset("taskdb"),
            Some(("utf8mb4".to_string(), "utf8mb4_unicode_ci".to_string()))
        );
        assert!(store
            .executed()
            .iter()
            .any(|sql| sql.starts_with("ALTER DATABASE `taskdb`")));
    }

    #[tokio::test]
    async fn test_create_denied_is_fatal() {
        let mut store = MemoryStore::new();
        store.fail_when(
            |s| matches!(s, Statement::CreateDatabase { .. }),
            1044,
            "Access denied for user 'memory'@'%' to database 'taskdb'",
        );

        let err = DatabaseBootstrap::new(&mut store, &SchemaSettings::default())
            .bootstrap("taskdb")
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Authorization { .. }));
        assert!(!store.has_database("taskdb"));
    }
}
