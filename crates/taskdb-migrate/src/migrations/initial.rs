//! Core tables, as first deployed.

use super::profile::PROFILE_COLUMNS;
use crate::ddl::Statement;
use crate::schema::{ColumnDef, ForeignKeyDef, TableDef};
use crate::step::{Check, Migration, MigrationStep};

pub const NAME: &str = "initial-schema";

fn created_at() -> ColumnDef {
    ColumnDef::new("created_at", "TIMESTAMP").default_value("CURRENT_TIMESTAMP")
}

pub fn users() -> TableDef {
    TableDef::new("users")
        .column(ColumnDef::serial("id"))
        .column(ColumnDef::new("name", "VARCHAR(100)").not_null())
        .column(ColumnDef::new("email", "VARCHAR(255)").not_null())
        .column(ColumnDef::new("password_hash", "VARCHAR(255)").not_null())
        .column(
            ColumnDef::new("is_active", "BOOLEAN")
                .not_null()
                .default_value("TRUE"),
        )
        .column(created_at())
        .primary_key("id")
}

pub fn schools() -> TableDef {
    TableDef::new("schools")
        .column(ColumnDef::serial("school_id"))
        .column(ColumnDef::new("name", "VARCHAR(255)").not_null())
        .column(ColumnDef::new("address", "VARCHAR(255)"))
        .column(created_at())
        .primary_key("school_id")
}

pub fn tasks() -> TableDef {
    TableDef::new("tasks")
        .column(ColumnDef::serial("task_id"))
        .column(ColumnDef::new("user_id", "INT").not_null())
        .column(ColumnDef::new("title", "VARCHAR(255)").not_null())
        .column(ColumnDef::new("description", "TEXT"))
        .column(
            ColumnDef::new("status", "ENUM('todo','in_progress','done')")
                .not_null()
                .default_value("'todo'"),
        )
        .column(ColumnDef::new("due_date", "DATE"))
        .column(created_at())
        .primary_key("task_id")
        .foreign_key(ForeignKeyDef::cascade("fk_tasks_user", "user_id", "users", "id"))
}

/// `subtasks` with the three-valued status it was first deployed with.
pub fn legacy_subtasks() -> TableDef {
    TableDef::new("subtasks")
        .column(ColumnDef::serial("subtask_id"))
        .column(ColumnDef::new("task_id", "INT").not_null())
        .column(ColumnDef::new("title", "VARCHAR(255)").not_null())
        .column(
            ColumnDef::new("subtask_status", "ENUM('todo','in_progress','done')")
                .default_value("'todo'"),
        )
        .column(ColumnDef::new("subtask_comment", "TEXT"))
        .column(ColumnDef::new("subtask_date", "DATE"))
        .column(created_at())
        .primary_key("subtask_id")
        .foreign_key(ForeignKeyDef::cascade(
            "fk_subtasks_task",
            "task_id",
            "tasks",
            "task_id",
        ))
}

pub fn settings() -> TableDef {
    TableDef::new("settings")
        .column(ColumnDef::serial("setting_id"))
        .column(ColumnDef::new("user_id", "INT").not_null())
        .column(
            ColumnDef::new("theme", "VARCHAR(20)")
                .not_null()
                .default_value("'light'"),
        )
        .column(
            ColumnDef::new("notifications_enabled", "BOOLEAN")
                .not_null()
                .default_value("TRUE"),
        )
        .column(ColumnDef::new("language", "VARCHAR(10)").default_value("'en'"))
        .primary_key("setting_id")
        .foreign_key(ForeignKeyDef::cascade(
            "fk_settings_user",
            "user_id",
            "users",
            "id",
        ))
}

/// Step creating `table` unless it already exists.
pub(crate) fn create_table_step(table: TableDef) -> MigrationStep {
    let name = table.name.clone();
    MigrationStep::new(format!("{}.create", name))
        .skip_if(Check::table_exists(&name))
        .apply(Statement::CreateTable(table))
        .verify(Check::table_exists(name))
}

/// `schools` is only created on a schema that has not moved past this
/// migration. Once `users` carries the profile columns the table has been
/// retired (or is about to be) and must not come back.
fn create_schools_step() -> MigrationStep {
    create_table_step(schools()).skip_if(Check::AnyOf(vec![
        Check::table_exists("schools"),
        Check::columns_exist("users", &PROFILE_COLUMNS),
    ]))
}

/// Parents before children, so foreign keys resolve on creation.
pub fn migration() -> Migration {
    Migration::new(NAME, "Create users, schools, tasks, subtasks and settings")
        .step(create_table_step(users()))
        .step(create_schools_step())
        .step(create_table_step(tasks()))
        .step(create_table_step(legacy_subtasks()))
        .step(create_table_step(settings()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnInfo, SchemaSnapshot};

    #[test]
    fn test_parents_created_before_children() {
        let ids: Vec<String> = migration().steps.into_iter().map(|s| s.id).collect();
        let pos = |id: &str| ids.iter().position(|s| s == id).unwrap();

        assert!(pos("users.create") < pos("tasks.create"));
        assert!(pos("tasks.create") < pos("subtasks.create"));
        assert!(pos("users.create") < pos("settings.create"));
    }

    #[test]
    fn test_schools_not_recreated_past_profile_columns() {
        let migration = migration();
        let step = migration
            .steps
            .iter()
            .find(|s| s.id == "schools.create")
            .unwrap();

        let mut snapshot = SchemaSnapshot::default();
        assert!(!step.skip_if.holds(&snapshot));

        snapshot.tables.insert("users".into());
        snapshot.columns.insert(
            "users".into(),
            PROFILE_COLUMNS
                .iter()
                .map(|c| ColumnInfo {
                    name: c.to_string(),
                    data_type: "varchar".into(),
                    is_nullable: true,
                })
                .collect(),
        );
        assert!(step.skip_if.holds(&snapshot));
        assert!(step.inspected_tables().contains(&"users"));
    }

    #[test]
    fn test_legacy_subtasks_shape() {
        let table = legacy_subtasks();
        let names = table.column_names();
        assert!(names.contains(&"subtask_status"));
        assert!(names.contains(&"subtask_comment"));
        assert!(names.contains(&"subtask_date"));
        assert!(!names.contains(&"is_completed"));
    }
}
