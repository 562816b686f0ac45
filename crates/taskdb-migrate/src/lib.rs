//! # taskdb-migrate
//!
//! Idempotent schema migrations for the task manager's MySQL database.
//!
//! MySQL commits most DDL statements individually, so nothing here relies on
//! transactions. Instead every step inspects live schema state before it
//! acts:
//!
//! - **Idempotent steps** that skip when their effect is already present
//! - **Fail-fast runner** that stops at the first failing step
//! - **Three-phase conversions** (add, backfill, drop) that never discard
//!   data before it has been copied
//! - **Best-effort reset** that drops every table with foreign key checks off
//! - **Database bootstrap** that always re-applies charset and collation
//!
//! ## Example
//!
//! ```rust,no_run
//! use taskdb_migrate::{migrations, Config, ConnectionManager, MigrationRunner};
//!
//! #[tokio::main]
//! async fn main() -> taskdb_migrate::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate(true)?;
//!     let migration = migrations::full_sequence();
//!     let report = ConnectionManager::scoped(&config, move |store| {
//!         Box::pin(async move { MigrationRunner::new().run(store, &migration).await })
//!     })
//!     .await?;
//!     println!("{} steps applied", report.applied());
//!     Ok(())
//! }
//! ```

pub mod bootstrap;
pub mod config;
pub mod connection;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod inspect;
pub mod migrations;
pub mod reset;
pub mod runner;
pub mod schema;
pub mod step;
pub mod store;

// Re-exports for convenient access
pub use bootstrap::{BootstrapReport, DatabaseBootstrap};
pub use config::{Config, ConnectionConfig, SchemaSettings};
pub use connection::ConnectionManager;
pub use ddl::{DdlExecutor, Statement};
pub use error::{MigrateError, Result};
pub use inspect::SchemaInspector;
pub use reset::{ResetEngine, ResetReport};
pub use runner::{MigrationRunner, RunReport, StepOutcome, StepReport, StepStatus};
pub use schema::{ColumnDef, ColumnInfo, ForeignKeyDef, SchemaSnapshot, TableDef};
pub use step::{Check, Migration, MigrationStep};
pub use store::{MysqlStore, SchemaStore};

#[cfg(any(test, feature = "testing"))]
pub use store::{MemValue, MemoryStore};
