//! Migration steps and the predicates that guard them.

use std::fmt;

use crate::ddl::Statement;
use crate::schema::SchemaSnapshot;

/// Predicate over live schema state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    TableExists(String),
    TableAbsent(String),
    ColumnExists { table: String, column: String },
    ColumnAbsent { table: String, column: String },
    AllOf(Vec<Check>),
    AnyOf(Vec<Check>),
}

impl Check {
    pub fn table_exists(table: impl Into<String>) -> Self {
        Check::TableExists(table.into())
    }

    pub fn table_absent(table: impl Into<String>) -> Self {
        Check::TableAbsent(table.into())
    }

    pub fn column_exists(table: impl Into<String>, column: impl Into<String>) -> Self {
        Check::ColumnExists {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn column_absent(table: impl Into<String>, column: impl Into<String>) -> Self {
        Check::ColumnAbsent {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Every one of `columns` exists on `table`.
    pub fn columns_exist(table: &str, columns: &[&str]) -> Self {
        Check::AllOf(
            columns
                .iter()
                .map(|c| Check::column_exists(table, *c))
                .collect(),
        )
    }

    /// Tables whose columns must be loaded to evaluate this check.
    pub fn tables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_tables(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_tables<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Check::TableExists(_) | Check::TableAbsent(_) => {}
            Check::ColumnExists { table, .. } | Check::ColumnAbsent { table, .. } => {
                out.push(table)
            }
            Check::AllOf(checks) | Check::AnyOf(checks) => {
                for c in checks {
                    c.collect_tables(out);
                }
            }
        }
    }

    /// Evaluate against a snapshot. A column of an absent table is absent.
    pub fn holds(&self, snapshot: &SchemaSnapshot) -> bool {
        match self {
            Check::TableExists(t) => snapshot.has_table(t),
            Check::TableAbsent(t) => !snapshot.has_table(t),
            Check::ColumnExists { table, column } => snapshot.has_column(table, column),
            Check::ColumnAbsent { table, column } => !snapshot.has_column(table, column),
            Check::AllOf(checks) => checks.iter().all(|c| c.holds(snapshot)),
            Check::AnyOf(checks) => checks.iter().any(|c| c.holds(snapshot)),
        }
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::TableExists(t) => write!(f, "table {} exists", t),
            Check::TableAbsent(t) => write!(f, "table {} is absent", t),
            Check::ColumnExists { table, column } => write!(f, "column {}.{} exists", table, column),
            Check::ColumnAbsent { table, column } => {
                write!(f, "column {}.{} is absent", table, column)
            }
            Check::AllOf(checks) => write_joined(f, checks, " and "),
            Check::AnyOf(checks) => write_joined(f, checks, " or "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, checks: &[Check], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (i, c) in checks.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", c)?;
    }
    write!(f, ")")
}

/// One idempotent unit of change.
///
/// `skip_if` holding means the step's effect is already present. `require`
/// must hold before anything is applied; `verify` must hold afterwards.
#[derive(Debug, Clone)]
pub struct MigrationStep {
    pub id: String,
    pub skip_if: Check,
    pub require: Option<Check>,
    pub apply: Vec<Statement>,
    pub verify: Option<Check>,
}

impl MigrationStep {
    /// A step that never skips and does nothing until given statements.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            skip_if: Check::AnyOf(Vec::new()),
            require: None,
            apply: Vec::new(),
            verify: None,
        }
    }

    pub fn skip_if(mut self, check: Check) -> Self {
        self.skip_if = check;
        self
    }

    pub fn require(mut self, check: Check) -> Self {
        self.require = Some(check);
        self
    }

    pub fn apply(mut self, statement: Statement) -> Self {
        self.apply.push(statement);
        self
    }

    pub fn verify(mut self, check: Check) -> Self {
        self.verify = Some(check);
        self
    }

    /// Tables to load columns for when evaluating this step's checks.
    pub fn inspected_tables(&self) -> Vec<&str> {
        let mut tables = self.skip_if.tables();
        for check in self.require.iter().chain(self.verify.iter()) {
            tables.extend(check.tables());
        }
        for statement in &self.apply {
            if let Statement::AddColumns { table, .. } | Statement::DropColumns { table, .. } =
                statement
            {
                tables.push(table.as_str());
            }
        }
        tables.sort_unstable();
        tables.dedup();
        tables
    }
}

/// A named, ordered list of steps.
#[derive(Debug, Clone)]
pub struct Migration {
    pub name: String,
    pub description: String,
    pub steps: Vec<MigrationStep>,
}

impl Migration {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: MigrationStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Concatenate migrations into one sequence under a new name.
    pub fn chain(
        name: impl Into<String>,
        description: impl Into<String>,
        parts: Vec<Migration>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            steps: parts.into_iter().flat_map(|m| m.steps).collect(),
        }
    }
}
