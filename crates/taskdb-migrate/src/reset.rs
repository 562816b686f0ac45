//! Drop every table of the selected database.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::ddl::{DdlExecutor, Statement};
use crate::error::Result;
use crate::inspect::SchemaInspector;
use crate::store::SchemaStore;

/// A table that could not be dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDrop {
    pub table: String,
    pub error: String,
}

/// Result of a reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResetReport {
    pub dropped: Vec<String>,
    pub failed: Vec<FailedDrop>,
}

impl ResetReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Empties a schema regardless of the foreign keys between its tables.
///
/// Foreign key checks are switched off for the session instead of ordering
/// the drops. A table that fails to drop is logged and recorded and the rest
/// are still attempted. Checks are switched back on before returning, on
/// every path; only a failure to do that fails the reset as a whole.
pub struct ResetEngine<'a> {
    store: &'a mut dyn SchemaStore,
}

impl<'a> ResetEngine<'a> {
    pub fn new(store: &'a mut dyn SchemaStore) -> Self {
        Self { store }
    }

    pub async fn reset(&mut self) -> Result<ResetReport> {
        DdlExecutor::new(&mut *self.store)
            .execute(&Statement::SetForeignKeyChecks(false))
            .await?;

        let result = self.drop_all().await;

        let restored = DdlExecutor::new(&mut *self.store)
            .execute(&Statement::SetForeignKeyChecks(true))
            .await;
        if let Err(e) = restored {
            error!("Could not re-enable foreign key checks: {}", e);
            return Err(e);
        }

        let report = result?;
        info!(
            "Reset complete: {} dropped, {} failed",
            report.dropped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn drop_all(&mut self) -> Result<ResetReport> {
        let tables = SchemaInspector::new(&mut *self.store).list_tables().await?;
        if tables.is_empty() {
            info!("No tables to drop");
            return Ok(ResetReport::default());
        }

        let mut report = ResetReport::default();
        for table in tables {
            let result = DdlExecutor::new(&mut *self.store)
                .execute(&Statement::DropTable(table.clone()))
                .await;
            match result {
                Ok(_) => {
                    info!("Dropped table {}", table);
                    report.dropped.push(table);
                }
                Err(e) => {
                    warn!("Failed to drop table {}: {}", table, e);
                    report.failed.push(FailedDrop {
                        table,
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MigrateError;
    use crate::schema::{ColumnDef, ForeignKeyDef, TableDef};
    use crate::store::MemoryStore;

    async fn linked_pair() -> MemoryStore {
        let mut store = MemoryStore::with_database("taskdb");
        store
            .execute(&Statement::CreateTable(
                TableDef::new("users")
                    .column(ColumnDef::serial("id"))
                    .primary_key("id"),
            ))
            .await
            .unwrap();
        store
            .execute(&Statement::CreateTable(
                TableDef::new("settings")
                    .column(ColumnDef::serial("setting_id"))
                    .column(ColumnDef::new("user_id", "INT").not_null())
                    .primary_key("setting_id")
                    .foreign_key(ForeignKeyDef::cascade("fk_settings_user", "user_id", "users", "id")),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_parent_listed_first_still_dropped() {
        let mut store = linked_pair().await;
        let report = ResetEngine::new(&mut store).reset().await.unwrap();

        assert_eq!(report.dropped, vec!["users", "settings"]);
        assert!(report.is_complete());
        assert!(store.foreign_key_checks());
    }

    #[tokio::test]
    async fn test_failed_drop_does_not_abort() {
        let mut store = linked_pair().await;
        store.fail_when(
            |s| matches!(s, Statement::DropTable(t) if t == "users"),
            1142,
            "DROP command denied to user 'memory' for table 'users'",
        );

        let report = ResetEngine::new(&mut store).reset().await.unwrap();

        assert_eq!(report.dropped, vec!["settings"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].table, "users");
        assert!(store.foreign_key_checks());
    }

    #[tokio::test]
    async fn test_restore_failure_is_an_error() {
        let mut store = linked_pair().await;
        store.fail_when(
            |s| matches!(s, Statement::SetForeignKeyChecks(true)),
            1227,
            "Access denied; you need the SYSTEM_VARIABLES_ADMIN privilege",
        );

        let err = ResetEngine::new(&mut store).reset().await.unwrap_err();
        assert!(matches!(err, MigrateError::Authorization { .. }));
        assert!(!store.has_table("users"));
    }
}
