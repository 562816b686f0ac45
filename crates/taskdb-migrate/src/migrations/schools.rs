//! Removal of the legacy `schools` table.

use crate::ddl::Statement;
use crate::step::{Check, Migration, MigrationStep};

pub const NAME: &str = "retire-schools";

pub fn migration() -> Migration {
    Migration::new(NAME, "Drop the legacy schools table").step(
        MigrationStep::new("schools.drop")
            .skip_if(Check::table_absent("schools"))
            .apply(Statement::DropTable("schools".into()))
            .verify(Check::table_absent("schools")),
    )
}
