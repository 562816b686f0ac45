//! Profile fields on `users`.

use crate::ddl::Statement;
use crate::schema::ColumnDef;
use crate::step::{Check, Migration, MigrationStep};

pub const NAME: &str = "profile-columns";

pub const PROFILE_COLUMNS: [&str; 4] = ["profile_image", "phone", "address", "bio"];

pub fn migration() -> Migration {
    Migration::new(NAME, "Add profile_image, phone, address and bio to users").step(
        MigrationStep::new("users.add_profile_columns")
            .skip_if(Check::columns_exist("users", &PROFILE_COLUMNS))
            .require(Check::table_exists("users"))
            .apply(Statement::AddColumns {
                table: "users".into(),
                columns: vec![
                    ColumnDef::new("profile_image", "VARCHAR(255)"),
                    ColumnDef::new("phone", "VARCHAR(20)"),
                    ColumnDef::new("address", "VARCHAR(255)"),
                    ColumnDef::new("bio", "TEXT"),
                ],
            })
            .verify(Check::columns_exist("users", &PROFILE_COLUMNS)),
    )
}
