//! Store backends the engine runs against.
//!
//! The [`SchemaStore`] trait is the only way the engine touches a database:
//!
//! - **MySQL**: [`MysqlStore`] in `mysql.rs`, one `mysql_async` connection
//! - **Memory**: `MemoryStore` in `memory.rs`, an in-process model of a MySQL
//!   server used by the test suite (`testing` feature)
//!
//! Every method takes `&mut self`: a store is one session, used by one caller
//! at a time, and the catalog reads after a statement must observe that
//! statement's effects.

#[cfg(any(test, feature = "testing"))]
mod memory;
mod mysql;

#[cfg(any(test, feature = "testing"))]
pub use memory::{MemValue, MemoryStore};
pub use mysql::MysqlStore;

use async_trait::async_trait;

use crate::ddl::Statement;
use crate::error::Result;
use crate::schema::ColumnInfo;

/// One session against a relational store.
#[async_trait]
pub trait SchemaStore: Send {
    /// Database currently selected by the session, if any.
    fn database(&self) -> Option<&str>;

    /// Tables of the selected database, in the order the store reports them.
    ///
    /// Returns an empty list when no database is selected.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Columns of `table` in ordinal order; empty when the table is absent.
    async fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Number of rows in `table`.
    async fn count_rows(&mut self, table: &str) -> Result<u64>;

    /// Execute one statement, returning the affected row count.
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// Get the backend type name for logging/debugging.
    fn backend_type(&self) -> &'static str;
}
