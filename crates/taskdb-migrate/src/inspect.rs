//! Read-only catalog queries.

use tracing::debug;

use crate::error::Result;
use crate::schema::{ColumnInfo, SchemaSnapshot};
use crate::store::SchemaStore;

/// Answers "is this already applied?" questions from live schema state.
///
/// Nothing is cached: every call goes to the store, so results always reflect
/// the statements executed before it on the same session.
pub struct SchemaInspector<'a> {
    store: &'a mut dyn SchemaStore,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(store: &'a mut dyn SchemaStore) -> Self {
        Self { store }
    }

    pub async fn list_tables(&mut self) -> Result<Vec<String>> {
        self.store.list_tables().await
    }

    /// Column names of `table` in ordinal order. Empty when the table is absent.
    pub async fn list_columns(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .columns(table)
            .await?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Full column descriptors of `table`.
    pub async fn columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.store.list_columns(table).await
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        Ok(self.list_tables().await?.iter().any(|t| t == table))
    }

    pub async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        Ok(self
            .columns(table)
            .await?
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(column)))
    }

    /// Every table name, plus the columns of `tables` that exist.
    pub async fn snapshot(&mut self, tables: &[&str]) -> Result<SchemaSnapshot> {
        let mut snapshot = SchemaSnapshot {
            tables: self.list_tables().await?.into_iter().collect(),
            ..Default::default()
        };
        for table in tables {
            if snapshot.has_table(table) && !snapshot.columns.contains_key(*table) {
                let cols = self.columns(table).await?;
                snapshot.columns.insert(table.to_string(), cols);
            }
        }
        debug!(
            "Snapshot: {} table(s), columns of {:?}",
            snapshot.tables.len(),
            snapshot.columns.keys().collect::<Vec<_>>()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::Statement;
    use crate::schema::{ColumnDef, TableDef};
    use crate::store::MemoryStore;

    async fn store_with_users() -> MemoryStore {
        let mut store = MemoryStore::with_database("taskdb");
        store
            .execute(&Statement::CreateTable(
                TableDef::new("users")
                    .column(ColumnDef::serial("id"))
                    .column(ColumnDef::new("email", "VARCHAR(255)").not_null())
                    .primary_key("id"),
            ))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_absent_objects_are_false_not_errors() {
        let mut store = store_with_users().await;
        let mut inspector = SchemaInspector::new(&mut store);

        assert!(inspector.table_exists("users").await.unwrap());
        assert!(!inspector.table_exists("tasks").await.unwrap());
        assert!(inspector.column_exists("users", "EMAIL").await.unwrap());
        assert!(!inspector.column_exists("users", "bio").await.unwrap());
        assert!(!inspector.column_exists("tasks", "status").await.unwrap());
        assert!(inspector.list_columns("tasks").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_only_loads_requested_tables() {
        let mut store = store_with_users().await;
        let snapshot = SchemaInspector::new(&mut store)
            .snapshot(&["users", "subtasks"])
            .await
            .unwrap();

        assert!(snapshot.has_table("users"));
        assert!(snapshot.has_column("users", "email"));
        assert_eq!(snapshot.columns.len(), 1);
    }

    #[tokio::test]
    async fn test_without_database_is_empty() {
        let mut store = MemoryStore::new();
        let snapshot = SchemaInspector::new(&mut store)
            .snapshot(&["users"])
            .await
            .unwrap();
        assert!(snapshot.tables.is_empty());
    }
}
