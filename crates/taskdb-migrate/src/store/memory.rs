//! In-process model of a MySQL server.
//!
//! Tracks databases, tables, columns, rows, foreign keys and the session's
//! `FOREIGN_KEY_CHECKS` flag, and reports failures with the same error codes
//! MySQL uses. Statements are logged as the MySQL dialect would render them.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::ddl::Statement;
use crate::dialect::MysqlDialect;
use crate::error::{codes, MigrateError, Result};
use crate::schema::{ColumnDef, ColumnInfo, ForeignKeyDef, TableDef};
use crate::store::SchemaStore;

const NO_DATABASE_SELECTED: u16 = 1046;
const FIELD_WITHOUT_DEFAULT: u16 = 1364;

/// A cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemValue {
    Null,
    Int(i64),
    Bool(bool),
    Text(String),
}

impl From<i64> for MemValue {
    fn from(v: i64) -> Self {
        MemValue::Int(v)
    }
}

impl From<bool> for MemValue {
    fn from(v: bool) -> Self {
        MemValue::Bool(v)
    }
}

impl From<&str> for MemValue {
    fn from(v: &str) -> Self {
        MemValue::Text(v.to_string())
    }
}

impl MemValue {
    /// Parse a SQL default literal.
    fn from_literal(literal: Option<&str>) -> Self {
        let Some(lit) = literal else {
            return MemValue::Null;
        };
        match lit.to_uppercase().as_str() {
            "NULL" => MemValue::Null,
            "TRUE" => MemValue::Bool(true),
            "FALSE" => MemValue::Bool(false),
            _ => {
                if let Some(inner) = lit.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
                    MemValue::Text(inner.replace("''", "'"))
                } else if let Ok(n) = lit.parse::<i64>() {
                    MemValue::Int(n)
                } else {
                    MemValue::Text(lit.to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
struct MemTable {
    name: String,
    columns: Vec<ColumnDef>,
    foreign_keys: Vec<ForeignKeyDef>,
    /// Each row is aligned with `columns`.
    rows: Vec<Vec<MemValue>>,
}

impl MemTable {
    fn from_def(def: &TableDef) -> Self {
        Self {
            name: def.name.clone(),
            columns: def.columns.clone(),
            foreign_keys: def.foreign_keys.clone(),
            rows: Vec::new(),
        }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone)]
struct MemDatabase {
    charset: String,
    collation: String,
    /// Creation order, which is also the order `list_tables` reports.
    tables: Vec<MemTable>,
}

impl MemDatabase {
    fn table(&self, name: &str) -> Option<&MemTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    fn table_mut(&mut self, name: &str) -> Option<&mut MemTable> {
        self.tables.iter_mut().find(|t| t.name == name)
    }
}

type FailureMatcher = Box<dyn Fn(&Statement) -> bool + Send>;

struct InjectedFailure {
    matcher: FailureMatcher,
    code: u16,
    message: String,
}

/// In-memory [`SchemaStore`].
pub struct MemoryStore {
    databases: BTreeMap<String, MemDatabase>,
    selected: Option<String>,
    foreign_key_checks: bool,
    dialect: MysqlDialect,
    log: Vec<String>,
    failures: Vec<InjectedFailure>,
    user: String,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// A server with no databases and none selected.
    pub fn new() -> Self {
        Self {
            databases: BTreeMap::new(),
            selected: None,
            foreign_key_checks: true,
            dialect: MysqlDialect::default(),
            log: Vec::new(),
            failures: Vec::new(),
            user: "memory".to_string(),
        }
    }

    /// A server with one empty database, selected.
    ///
    /// The database starts with the legacy `latin1` server default, as on a
    /// host whose configuration predates utf8mb4.
    pub fn with_database(name: &str) -> Self {
        let mut store = Self::new();
        store.databases.insert(
            name.to_string(),
            MemDatabase {
                charset: "latin1".to_string(),
                collation: "latin1_swedish_ci".to_string(),
                tables: Vec::new(),
            },
        );
        store.selected = Some(name.to_string());
        store
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.databases.contains_key(name)
    }

    /// `(charset, collation)` of a database.
    pub fn database_charset(&self, name: &str) -> Option<(String, String)> {
        self.databases
            .get(name)
            .map(|db| (db.charset.clone(), db.collation.clone()))
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.current()
            .map(|db| db.table(table).is_some())
            .unwrap_or(false)
    }

    pub fn foreign_key_checks(&self) -> bool {
        self.foreign_key_checks
    }

    /// SQL of every statement executed so far.
    pub fn executed(&self) -> &[String] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Make every statement matching `matcher` fail with a server error.
    pub fn fail_when<F>(&mut self, matcher: F, code: u16, message: impl Into<String>)
    where
        F: Fn(&Statement) -> bool + Send + 'static,
    {
        self.failures.push(InjectedFailure {
            matcher: Box::new(matcher),
            code,
            message: message.into(),
        });
    }

    pub fn clear_failures(&mut self) {
        self.failures.clear();
    }

    /// Insert one row. Unlisted columns take their default.
    pub fn insert(&mut self, table: &str, values: &[(&str, MemValue)]) -> Result<()> {
        let checks = self.foreign_key_checks;
        let db = self.current_or_err()?;
        let t = db
            .table(table)
            .ok_or_else(|| self.no_such_table(table))?;

        let mut row = Vec::with_capacity(t.columns.len());
        for col in &t.columns {
            let given = values
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(&col.name))
                .map(|(_, v)| v.clone());
            let value = match given {
                Some(v) => v,
                None if col.auto_increment => {
                    let idx = row.len();
                    let max = t
                        .rows
                        .iter()
                        .filter_map(|r| match r[idx] {
                            MemValue::Int(n) => Some(n),
                            _ => None,
                        })
                        .max()
                        .unwrap_or(0);
                    MemValue::Int(max + 1)
                }
                None if col.default.is_none() && !col.nullable => {
                    return Err(self.server_error(
                        FIELD_WITHOUT_DEFAULT,
                        format!("Field '{}' doesn't have a default value", col.name),
                    ));
                }
                None => MemValue::from_literal(col.default.as_deref()),
            };
            row.push(value);
        }

        for (name, _) in values {
            if t.column_index(name).is_none() {
                return Err(self.server_error(
                    codes::UNKNOWN_COLUMN,
                    format!("Unknown column '{}' in 'field list'", name),
                ));
            }
        }

        if checks {
            for fk in &t.foreign_keys {
                let Some(idx) = t.column_index(&fk.columns[0]) else {
                    continue;
                };
                if row[idx] == MemValue::Null {
                    continue;
                }
                let parent_has_row = db
                    .table(&fk.ref_table)
                    .and_then(|p| p.column_index(&fk.ref_columns[0]).map(|i| (p, i)))
                    .map(|(p, i)| p.rows.iter().any(|r| r[i] == row[idx]))
                    .unwrap_or(false);
                if !parent_has_row {
                    return Err(self.server_error(
                        codes::NO_REFERENCED_ROW,
                        format!(
                            "Cannot add or update a child row: a foreign key constraint fails ({})",
                            fk.name
                        ),
                    ));
                }
            }
        }

        let db = self.current_mut()?;
        if let Some(t) = db.table_mut(table) {
            t.rows.push(row);
        }
        Ok(())
    }

    /// Values of one column for every row, in insertion order.
    pub fn select_column(&self, table: &str, column: &str) -> Result<Vec<MemValue>> {
        let db = self.current_or_err()?;
        let t = db.table(table).ok_or_else(|| self.no_such_table(table))?;
        let idx = t.column_index(column).ok_or_else(|| {
            self.server_error(
                codes::UNKNOWN_COLUMN,
                format!("Unknown column '{}' in 'field list'", column),
            )
        })?;
        Ok(t.rows.iter().map(|r| r[idx].clone()).collect())
    }

    fn current(&self) -> Option<&MemDatabase> {
        self.selected.as_ref().and_then(|n| self.databases.get(n))
    }

    fn current_or_err(&self) -> Result<&MemDatabase> {
        self.current()
            .ok_or_else(|| self.server_error(NO_DATABASE_SELECTED, "No database selected"))
    }

    fn current_mut(&mut self) -> Result<&mut MemDatabase> {
        let err = self.server_error(NO_DATABASE_SELECTED, "No database selected");
        match self.selected.clone() {
            Some(name) => self.databases.get_mut(&name).ok_or(err),
            None => Err(err),
        }
    }

    fn server_error(&self, code: u16, message: impl Into<String>) -> MigrateError {
        MigrateError::from_server(code, message, &self.user, self.selected.as_deref())
    }

    fn no_such_table(&self, table: &str) -> MigrateError {
        self.server_error(
            codes::NO_SUCH_TABLE,
            format!(
                "Table '{}.{}' doesn't exist",
                self.selected.as_deref().unwrap_or(""),
                table
            ),
        )
    }

    fn unknown_database(&self, name: &str) -> MigrateError {
        MigrateError::from_server(
            codes::UNKNOWN_DATABASE,
            format!("Unknown database '{}'", name),
            &self.user,
            Some(name),
        )
    }

    fn apply(&mut self, statement: &Statement) -> Result<u64> {
        match statement {
            Statement::CreateDatabase {
                name,
                charset,
                collation,
            } => {
                if self.databases.contains_key(name) {
                    return Ok(0);
                }
                self.databases.insert(
                    name.clone(),
                    MemDatabase {
                        charset: charset.clone(),
                        collation: collation.clone(),
                        tables: Vec::new(),
                    },
                );
                Ok(1)
            }
            Statement::AlterDatabaseCharset {
                name,
                charset,
                collation,
            } => {
                let err = self.unknown_database(name);
                let db = self.databases.get_mut(name).ok_or(err)?;
                db.charset = charset.clone();
                db.collation = collation.clone();
                Ok(1)
            }
            Statement::UseDatabase(name) => {
                if !self.databases.contains_key(name) {
                    return Err(self.unknown_database(name));
                }
                self.selected = Some(name.clone());
                Ok(0)
            }
            Statement::CreateTable(def) => self.create_table(def),
            Statement::AddColumns { table, columns } => self.add_columns(table, columns),
            Statement::DropColumns { table, columns } => self.drop_columns(table, columns),
            Statement::Backfill {
                table,
                target,
                source,
                matches,
            } => self.backfill(table, target, source, matches),
            Statement::DropTable(name) => self.drop_table(name),
            Statement::SetForeignKeyChecks(on) => {
                self.foreign_key_checks = *on;
                Ok(0)
            }
        }
    }

    fn create_table(&mut self, def: &TableDef) -> Result<u64> {
        let checks = self.foreign_key_checks;
        let db = self.current_or_err()?;
        if db.table(&def.name).is_some() {
            return Ok(0);
        }
        if checks {
            for fk in &def.foreign_keys {
                if fk.ref_table != def.name && db.table(&fk.ref_table).is_none() {
                    return Err(self.server_error(
                        codes::FK_NO_INDEX_PARENT,
                        format!(
                            "Failed to open the referenced table '{}'",
                            fk.ref_table
                        ),
                    ));
                }
            }
        }
        self.current_mut()?.tables.push(MemTable::from_def(def));
        Ok(0)
    }

    fn add_columns(&mut self, table: &str, columns: &[ColumnDef]) -> Result<u64> {
        let db = self.current_or_err()?;
        let t = db.table(table).ok_or_else(|| self.no_such_table(table))?;

        // A compound ALTER applies all clauses or none
        for (i, col) in columns.iter().enumerate() {
            let repeated = columns[..i]
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&col.name));
            if t.column_index(&col.name).is_some() || repeated {
                return Err(self.server_error(
                    codes::DUPLICATE_COLUMN,
                    format!("Duplicate column name '{}'", col.name),
                ));
            }
        }

        let db = self.current_mut()?;
        if let Some(t) = db.table_mut(table) {
            for col in columns {
                let fill = MemValue::from_literal(col.default.as_deref());
                for row in &mut t.rows {
                    row.push(fill.clone());
                }
                t.columns.push(col.clone());
            }
        }
        Ok(0)
    }

    fn drop_columns(&mut self, table: &str, columns: &[String]) -> Result<u64> {
        let db = self.current_or_err()?;
        let t = db.table(table).ok_or_else(|| self.no_such_table(table))?;

        for col in columns {
            if t.column_index(col).is_none() {
                return Err(self.server_error(
                    codes::CANT_DROP_FIELD_OR_KEY,
                    format!("Can't DROP '{}'; check that column/key exists", col),
                ));
            }
        }

        let db = self.current_mut()?;
        if let Some(t) = db.table_mut(table) {
            for col in columns {
                if let Some(idx) = t.column_index(col) {
                    t.columns.remove(idx);
                    for row in &mut t.rows {
                        row.remove(idx);
                    }
                }
            }
        }
        Ok(0)
    }

    fn backfill(&mut self, table: &str, target: &str, source: &str, matches: &str) -> Result<u64> {
        let db = self.current_or_err()?;
        let t = db.table(table).ok_or_else(|| self.no_such_table(table))?;
        let unknown = |c: &str| {
            self.server_error(
                codes::UNKNOWN_COLUMN,
                format!("Unknown column '{}' in 'field list'", c),
            )
        };
        let target_idx = t.column_index(target).ok_or_else(|| unknown(target))?;
        let source_idx = t.column_index(source).ok_or_else(|| unknown(source))?;

        let wanted = MemValue::Text(matches.to_string());
        let db = self.current_mut()?;
        let mut changed = 0;
        if let Some(t) = db.table_mut(table) {
            for row in &mut t.rows {
                let value = MemValue::Bool(row[source_idx] == wanted);
                if row[target_idx] != value {
                    row[target_idx] = value;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    fn drop_table(&mut self, name: &str) -> Result<u64> {
        let checks = self.foreign_key_checks;
        let db = self.current_or_err()?;
        if db.table(name).is_none() {
            return Ok(0);
        }
        if checks {
            let referencing = db.tables.iter().find_map(|t| {
                t.foreign_keys
                    .iter()
                    .find(|fk| fk.ref_table == name && t.name != name)
                    .map(|fk| (fk.name.clone(), t.name.clone()))
            });
            if let Some((fk, child)) = referencing {
                return Err(self.server_error(
                    codes::FK_CANNOT_DROP_PARENT,
                    format!(
                        "Cannot drop table '{}' referenced by a foreign key constraint '{}' on table '{}'.",
                        name, fk, child
                    ),
                ));
            }
        }
        self.current_mut()?.tables.retain(|t| t.name != name);
        Ok(0)
    }
}

#[async_trait]
impl SchemaStore for MemoryStore {
    fn database(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    async fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(self
            .current()
            .map(|db| db.tables.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn list_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self
            .current()
            .and_then(|db| db.table(table))
            .map(|t| {
                t.columns
                    .iter()
                    .map(|c| ColumnInfo {
                        name: c.name.clone(),
                        data_type: c.sql_type.to_lowercase(),
                        is_nullable: c.nullable,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_rows(&mut self, table: &str) -> Result<u64> {
        let db = self.current_or_err()?;
        let t = db.table(table).ok_or_else(|| self.no_such_table(table))?;
        Ok(t.rows.len() as u64)
    }

    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        if let Some(f) = self.failures.iter().find(|f| (f.matcher)(statement)) {
            let (code, message) = (f.code, f.message.clone());
            return Err(self.server_error(code, message));
        }
        self.log.push(self.dialect.render(statement));
        self.apply(statement)
    }

    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
