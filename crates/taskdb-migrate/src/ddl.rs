//! Schema- and data-mutating statements and their executor.

use tracing::debug;

use crate::error::Result;
use crate::schema::{ColumnDef, TableDef};
use crate::store::SchemaStore;

/// One physical statement sent to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `CREATE DATABASE IF NOT EXISTS` with an explicit charset.
    CreateDatabase {
        name: String,
        charset: String,
        collation: String,
    },
    /// `ALTER DATABASE ... CHARACTER SET ... COLLATE ...`.
    AlterDatabaseCharset {
        name: String,
        charset: String,
        collation: String,
    },
    /// Select the session's default database.
    UseDatabase(String),
    /// `CREATE TABLE IF NOT EXISTS`.
    CreateTable(TableDef),
    /// One compound `ALTER TABLE ... ADD COLUMN a, ADD COLUMN b`.
    AddColumns { table: String, columns: Vec<ColumnDef> },
    /// One compound `ALTER TABLE ... DROP COLUMN a, DROP COLUMN b`.
    DropColumns { table: String, columns: Vec<String> },
    /// Set-based update: `target = (source = matches)` for every row.
    Backfill {
        table: String,
        target: String,
        source: String,
        matches: String,
    },
    /// `DROP TABLE IF EXISTS`.
    DropTable(String),
    /// Toggle referential-integrity enforcement for the session.
    SetForeignKeyChecks(bool),
}

impl Statement {
    /// Short human-readable label for logs.
    pub fn describe(&self) -> String {
        match self {
            Statement::CreateDatabase { name, .. } => format!("create database {}", name),
            Statement::AlterDatabaseCharset {
                name,
                charset,
                collation,
            } => format!("set {} charset {}/{}", name, charset, collation),
            Statement::UseDatabase(name) => format!("use {}", name),
            Statement::CreateTable(t) => format!("create table {}", t.name),
            Statement::AddColumns { table, columns } => format!(
                "add {} to {}",
                columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                table
            ),
            Statement::DropColumns { table, columns } => {
                format!("drop {} from {}", columns.join(", "), table)
            }
            Statement::Backfill {
                table,
                target,
                source,
                ..
            } => format!("backfill {}.{} from {}", table, target, source),
            Statement::DropTable(name) => format!("drop table {}", name),
            Statement::SetForeignKeyChecks(on) => {
                format!("foreign key checks {}", if *on { "on" } else { "off" })
            }
        }
    }
}

/// Issues statements through a store.
///
/// Errors come back exactly as the store classified them. Nothing is retried:
/// a DDL statement that failed may or may not have taken effect, and only a
/// fresh inspection can tell.
pub struct DdlExecutor<'a> {
    store: &'a mut dyn SchemaStore,
}

impl<'a> DdlExecutor<'a> {
    pub fn new(store: &'a mut dyn SchemaStore) -> Self {
        Self { store }
    }

    /// Execute one statement, returning the affected row count.
    pub async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        debug!("Executing: {}", statement.describe());
        let affected = self.store.execute(statement).await?;
        debug!("{} row(s) affected", affected);
        Ok(affected)
    }

    /// Execute statements in order, stopping at the first failure.
    pub async fn execute_all(&mut self, statements: &[Statement]) -> Result<u64> {
        let mut total = 0;
        for statement in statements {
            total += self.execute(statement).await?;
        }
        Ok(total)
    }
}
