//! Subtask completion flag.
//!
//! Two independent paths lead to the same `subtasks` shape. An existing table
//! is converted in place (`subtask-completion`); a database without one gets
//! it created directly (`subtask-tables`). Each path skips what the other
//! already did.

use crate::ddl::Statement;
use crate::schema::{ColumnDef, ForeignKeyDef, TableDef};
use crate::step::{Check, Migration, MigrationStep};

use super::initial::create_table_step;

pub const CONVERT_NAME: &str = "subtask-completion";
pub const CREATE_NAME: &str = "subtask-tables";

const TABLE: &str = "subtasks";
const FLAG: &str = "is_completed";
const LEGACY_STATUS: &str = "subtask_status";
pub const LEGACY_COLUMNS: [&str; 3] = ["subtask_status", "subtask_comment", "subtask_date"];

fn completion_flag() -> ColumnDef {
    ColumnDef::new(FLAG, "BOOLEAN")
        .not_null()
        .default_value("FALSE")
}

fn absent_or(check: Check) -> Check {
    Check::AnyOf(vec![Check::table_absent(TABLE), check])
}

/// Add the flag, derive it from the old status, then drop the old columns.
pub fn convert() -> Migration {
    let legacy_gone = Check::AllOf(
        LEGACY_COLUMNS
            .iter()
            .map(|c| Check::column_absent(TABLE, *c))
            .collect(),
    );

    Migration::new(
        CONVERT_NAME,
        "Replace subtasks.subtask_status with the is_completed flag",
    )
    .step(
        MigrationStep::new("subtasks.add_is_completed")
            .skip_if(absent_or(Check::column_exists(TABLE, FLAG)))
            .apply(Statement::AddColumns {
                table: TABLE.into(),
                columns: vec![completion_flag()],
            })
            .verify(Check::column_exists(TABLE, FLAG)),
    )
    .step(
        MigrationStep::new("subtasks.backfill_is_completed")
            .skip_if(absent_or(Check::column_absent(TABLE, LEGACY_STATUS)))
            .require(Check::column_exists(TABLE, FLAG))
            .apply(Statement::Backfill {
                table: TABLE.into(),
                target: FLAG.into(),
                source: LEGACY_STATUS.into(),
                matches: "done".into(),
            }),
    )
    .step(
        MigrationStep::new("subtasks.drop_legacy_columns")
            .skip_if(absent_or(legacy_gone.clone()))
            .require(Check::column_exists(TABLE, FLAG))
            .apply(Statement::DropColumns {
                table: TABLE.into(),
                columns: LEGACY_COLUMNS.iter().map(|c| c.to_string()).collect(),
            })
            .verify(legacy_gone),
    )
}

/// `subtasks` as it looks after conversion.
pub fn subtasks() -> TableDef {
    TableDef::new(TABLE)
        .column(ColumnDef::serial("subtask_id"))
        .column(ColumnDef::new("task_id", "INT").not_null())
        .column(ColumnDef::new("title", "VARCHAR(255)").not_null())
        .column(completion_flag())
        .column(ColumnDef::new("created_at", "TIMESTAMP").default_value("CURRENT_TIMESTAMP"))
        .primary_key("subtask_id")
        .foreign_key(ForeignKeyDef::cascade(
            "fk_subtasks_task",
            "task_id",
            "tasks",
            "task_id",
        ))
}

pub fn subtask_images() -> TableDef {
    TableDef::new("subtask_images")
        .column(ColumnDef::serial("image_id"))
        .column(ColumnDef::new("subtask_id", "INT").not_null())
        .column(ColumnDef::new("image_url", "VARCHAR(255)").not_null())
        .column(ColumnDef::new("uploaded_at", "TIMESTAMP").default_value("CURRENT_TIMESTAMP"))
        .primary_key("image_id")
        .foreign_key(ForeignKeyDef::cascade(
            "fk_subtask_images_subtask",
            "subtask_id",
            "subtasks",
            "subtask_id",
        ))
}

/// Create `subtasks` and `subtask_images` where they do not exist yet.
pub fn create() -> Migration {
    Migration::new(CREATE_NAME, "Create subtasks and subtask_images")
        .step(
            MigrationStep::new("subtasks.create_converged")
                .skip_if(Check::table_exists(TABLE))
                .require(Check::table_exists("tasks"))
                .apply(Statement::CreateTable(subtasks()))
                .verify(Check::column_exists(TABLE, FLAG)),
        )
        .step(create_table_step(subtask_images()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnInfo, SchemaSnapshot};

    fn legacy_snapshot() -> SchemaSnapshot {
        let mut s = SchemaSnapshot::default();
        s.tables.insert(TABLE.into());
        s.columns.insert(
            TABLE.into(),
            ["subtask_id", "task_id", "subtask_status", "subtask_comment", "subtask_date"]
                .iter()
                .map(|c| ColumnInfo {
                    name: c.to_string(),
                    data_type: "text".into(),
                    is_nullable: true,
                })
                .collect(),
        );
        s
    }

    #[test]
    fn test_phases_run_in_order() {
        let ids: Vec<String> = convert().steps.into_iter().map(|s| s.id).collect();
        assert_eq!(
            ids,
            vec![
                "subtasks.add_is_completed",
                "subtasks.backfill_is_completed",
                "subtasks.drop_legacy_columns"
            ]
        );
    }

    #[test]
    fn test_drop_requires_flag() {
        let migration = convert();
        let drop = &migration.steps[2];
        let snapshot = legacy_snapshot();

        assert!(!drop.skip_if.holds(&snapshot));
        assert!(!drop.require.as_ref().unwrap().holds(&snapshot));
    }

    #[test]
    fn test_every_phase_skips_without_table() {
        let empty = SchemaSnapshot::default();
        assert!(convert().steps.iter().all(|s| s.skip_if.holds(&empty)));
    }

    #[test]
    fn test_created_shape_matches_converted_shape() {
        let table = subtasks();
        let names = table.column_names();
        assert!(names.contains(&FLAG));
        assert!(LEGACY_COLUMNS.iter().all(|c| !names.contains(c)));
    }
}
