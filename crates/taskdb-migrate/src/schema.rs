//! Table, column and snapshot types.
//!
//! Definitions ([`TableDef`], [`ColumnDef`], [`ForeignKeyDef`]) describe what a
//! step wants to create. [`ColumnInfo`] and [`SchemaSnapshot`] describe what the
//! store reports right now.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Column to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Declared SQL type, e.g. `VARCHAR(255)` or `ENUM('todo','done')`.
    pub sql_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default value as a SQL literal (`FALSE`, `'todo'`, `CURRENT_TIMESTAMP`).
    pub default: Option<String>,
    /// AUTO_INCREMENT column.
    pub auto_increment: bool,
}

impl ColumnDef {
    /// Nullable column with no default.
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            auto_increment: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, literal: impl Into<String>) -> Self {
        self.default = Some(literal.into());
        self
    }

    /// `INT NOT NULL AUTO_INCREMENT` surrogate key.
    pub fn serial(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: "INT".to_string(),
            nullable: false,
            default: None,
            auto_increment: true,
        }
    }
}

/// Foreign key from the owning table to `ref_table`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDef {
    pub name: String,
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
    /// Referential action, e.g. `CASCADE`.
    pub on_delete: String,
}

impl ForeignKeyDef {
    /// Single-column foreign key with `ON DELETE CASCADE`.
    pub fn cascade(
        name: impl Into<String>,
        column: impl Into<String>,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns: vec![column.into()],
            ref_table: ref_table.into(),
            ref_columns: vec![ref_column.into()],
            on_delete: "CASCADE".to_string(),
        }
    }
}

/// Table to be created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key.push(column.into());
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKeyDef) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Column as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Declared type as the store reports it (`varchar(255)`, `tinyint(1)`).
    pub data_type: String,
    pub is_nullable: bool,
}

/// Read-only view of live schema state, taken for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSnapshot {
    /// Every table in the selected database.
    pub tables: BTreeSet<String>,
    /// Columns, in ordinal order, of the tables that were inspected.
    pub columns: BTreeMap<String, Vec<ColumnInfo>>,
}

impl SchemaSnapshot {
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    /// Column names compare case-insensitively, as MySQL does.
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns
            .get(table)
            .map(|cols| cols.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
            .unwrap_or(false)
    }
}
