//! MySQL rendering of [`Statement`]s.

use crate::config::SchemaSettings;
use crate::ddl::Statement;
use crate::schema::{ColumnDef, ForeignKeyDef, TableDef};

/// MySQL/MariaDB SQL syntax.
#[derive(Debug, Clone)]
pub struct MysqlDialect {
    charset: String,
    collation: String,
}

impl Default for MysqlDialect {
    fn default() -> Self {
        Self::new(&SchemaSettings::default())
    }
}

impl MysqlDialect {
    /// Tables are created with the given charset and collation.
    pub fn new(settings: &SchemaSettings) -> Self {
        Self {
            charset: settings.charset.clone(),
            collation: settings.collation.clone(),
        }
    }

    /// Quote a MySQL identifier.
    pub fn quote_ident(name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    /// Quote a string literal.
    pub fn quote_literal(value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    /// Render a statement as SQL text.
    pub fn render(&self, statement: &Statement) -> String {
        match statement {
            Statement::CreateDatabase {
                name,
                charset,
                collation,
            } => format!(
                "CREATE DATABASE IF NOT EXISTS {} CHARACTER SET {} COLLATE {}",
                Self::quote_ident(name),
                charset,
                collation
            ),
            Statement::AlterDatabaseCharset {
                name,
                charset,
                collation,
            } => format!(
                "ALTER DATABASE {} CHARACTER SET {} COLLATE {}",
                Self::quote_ident(name),
                charset,
                collation
            ),
            Statement::UseDatabase(name) => format!("USE {}", Self::quote_ident(name)),
            Statement::CreateTable(table) => self.create_table(table),
            Statement::AddColumns { table, columns } => {
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|c| format!("ADD COLUMN {}", Self::column_def(c)))
                    .collect();
                format!(
                    "ALTER TABLE {} {}",
                    Self::quote_ident(table),
                    clauses.join(", ")
                )
            }
            Statement::DropColumns { table, columns } => {
                let clauses: Vec<String> = columns
                    .iter()
                    .map(|c| format!("DROP COLUMN {}", Self::quote_ident(c)))
                    .collect();
                format!(
                    "ALTER TABLE {} {}",
                    Self::quote_ident(table),
                    clauses.join(", ")
                )
            }
            Statement::Backfill {
                table,
                target,
                source,
                matches,
            } => format!(
                "UPDATE {} SET {} = CASE WHEN {} = {} THEN TRUE ELSE FALSE END",
                Self::quote_ident(table),
                Self::quote_ident(target),
                Self::quote_ident(source),
                Self::quote_literal(matches)
            ),
            Statement::DropTable(name) => {
                format!("DROP TABLE IF EXISTS {}", Self::quote_ident(name))
            }
            Statement::SetForeignKeyChecks(on) => {
                format!("SET FOREIGN_KEY_CHECKS = {}", if *on { 1 } else { 0 })
            }
        }
    }

    fn column_def(col: &ColumnDef) -> String {
        let mut def = format!("{} {}", Self::quote_ident(&col.name), col.sql_type);
        if !col.nullable {
            def.push_str(" NOT NULL");
        }
        if col.auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        if let Some(default) = &col.default {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        def
    }

    fn foreign_key(fk: &ForeignKeyDef) -> String {
        let cols: Vec<String> = fk.columns.iter().map(|c| Self::quote_ident(c)).collect();
        let ref_cols: Vec<String> = fk.ref_columns.iter().map(|c| Self::quote_ident(c)).collect();
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            Self::quote_ident(&fk.name),
            cols.join(", "),
            Self::quote_ident(&fk.ref_table),
            ref_cols.join(", "),
            map_referential_action(&fk.on_delete)
        )
    }

    fn create_table(&self, table: &TableDef) -> String {
        let mut defs: Vec<String> = table.columns.iter().map(Self::column_def).collect();

        if !table.primary_key.is_empty() {
            let pk: Vec<String> = table
                .primary_key
                .iter()
                .map(|c| Self::quote_ident(c))
                .collect();
            defs.push(format!("PRIMARY KEY ({})", pk.join(", ")));
        }
        defs.extend(table.foreign_keys.iter().map(Self::foreign_key));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET={} COLLATE={}",
            Self::quote_ident(&table.name),
            defs.join(",\n    "),
            self.charset,
            self.collation
        )
    }
}

/// Map referential action.
fn map_referential_action(action: &str) -> &str {
    match action.to_uppercase().as_str() {
        "CASCADE" => "CASCADE",
        "SET_NULL" | "SET NULL" => "SET NULL",
        "NO_ACTION" | "NO ACTION" => "NO ACTION",
        "RESTRICT" => "RESTRICT",
        _ => "NO ACTION",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(MysqlDialect::quote_ident("name"), "`name`");
        assert_eq!(MysqlDialect::quote_ident("table`name"), "`table``name`");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(MysqlDialect::quote_literal("done"), "'done'");
        assert_eq!(MysqlDialect::quote_literal("it's"), "'it''s'");
    }

    #[test]
    fn test_add_columns_is_one_statement() {
        let sql = MysqlDialect::default().render(&Statement::AddColumns {
            table: "users".into(),
            columns: vec![
                ColumnDef::new("phone", "VARCHAR(20)"),
                ColumnDef::new("bio", "TEXT"),
            ],
        });
        assert_eq!(
            sql,
            "ALTER TABLE `users` ADD COLUMN `phone` VARCHAR(20), ADD COLUMN `bio` TEXT"
        );
    }

    #[test]
    fn test_drop_columns_is_one_statement() {
        let sql = MysqlDialect::default().render(&Statement::DropColumns {
            table: "subtasks".into(),
            columns: vec!["subtask_status".into(), "subtask_date".into()],
        });
        assert_eq!(
            sql,
            "ALTER TABLE `subtasks` DROP COLUMN `subtask_status`, DROP COLUMN `subtask_date`"
        );
    }

    #[test]
    fn test_backfill_is_set_based() {
        let sql = MysqlDialect::default().render(&Statement::Backfill {
            table: "subtasks".into(),
            target: "is_completed".into(),
            source: "subtask_status".into(),
            matches: "done".into(),
        });
        assert_eq!(
            sql,
            "UPDATE `subtasks` SET `is_completed` = CASE WHEN `subtask_status` = 'done' THEN TRUE ELSE FALSE END"
        );
    }

    #[test]
    fn test_create_database_sets_charset() {
        let sql = MysqlDialect::default().render(&Statement::CreateDatabase {
            name: "taskdb".into(),
            charset: "utf8mb4".into(),
            collation: "utf8mb4_unicode_ci".into(),
        });
        assert_eq!(
            sql,
            "CREATE DATABASE IF NOT EXISTS `taskdb` CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci"
        );
    }

    #[test]
    fn test_create_table_with_foreign_key() {
        let table = TableDef::new("subtasks")
            .column(ColumnDef::serial("subtask_id"))
            .column(ColumnDef::new("task_id", "INT").not_null())
            .column(
                ColumnDef::new("is_completed", "BOOLEAN")
                    .not_null()
                    .default_value("FALSE"),
            )
            .primary_key("subtask_id")
            .foreign_key(ForeignKeyDef::cascade(
                "fk_subtasks_task",
                "task_id",
                "tasks",
                "task_id",
            ));

        let sql = MysqlDialect::default().render(&Statement::CreateTable(table));
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `subtasks` ("));
        assert!(sql.contains("`subtask_id` INT NOT NULL AUTO_INCREMENT"));
        assert!(sql.contains("`is_completed` BOOLEAN NOT NULL DEFAULT FALSE"));
        assert!(sql.contains("PRIMARY KEY (`subtask_id`)"));
        assert!(sql.contains(
            "CONSTRAINT `fk_subtasks_task` FOREIGN KEY (`task_id`) REFERENCES `tasks` (`task_id`) ON DELETE CASCADE"
        ));
        assert!(sql.ends_with("ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci"));
    }

    #[test]
    fn test_foreign_key_checks_toggle() {
        let dialect = MysqlDialect::default();
        assert_eq!(
            dialect.render(&Statement::SetForeignKeyChecks(false)),
            "SET FOREIGN_KEY_CHECKS = 0"
        );
        assert_eq!(
            dialect.render(&Statement::SetForeignKeyChecks(true)),
            "SET FOREIGN_KEY_CHECKS = 1"
        );
    }

    #[test]
    fn test_map_referential_action() {
        assert_eq!(map_referential_action("CASCADE"), "CASCADE");
        assert_eq!(map_referential_action("SET_NULL"), "SET NULL");
        assert_eq!(map_referential_action("bogus"), "NO ACTION");
    }
}
