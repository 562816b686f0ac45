//! The migrations this tool ships.
//!
//! Each migration is a list of idempotent steps; [`full_sequence`] chains
//! them in deployment order:
//!
//! 1. `initial-schema` - core tables
//! 2. `profile-columns` - profile fields on `users`
//! 3. `subtask-completion` - convert an existing `subtasks` to `is_completed`
//! 4. `subtask-tables` - create `subtasks` and `subtask_images` if missing
//! 5. `retire-schools` - drop the legacy `schools` table

pub mod initial;
pub mod profile;
pub mod schools;
pub mod subtasks;

use crate::step::Migration;

pub const FULL_SEQUENCE_NAME: &str = "migrate";

/// Every migration, in the order `migrate` runs them.
pub fn catalog() -> Vec<Migration> {
    vec![
        initial::migration(),
        profile::migration(),
        subtasks::convert(),
        subtasks::create(),
        schools::migration(),
    ]
}

/// Look up a migration by name. `migrate` names the full sequence.
pub fn by_name(name: &str) -> Option<Migration> {
    if name == FULL_SEQUENCE_NAME {
        return Some(full_sequence());
    }
    catalog().into_iter().find(|m| m.name == name)
}

/// All migrations as one step list.
pub fn full_sequence() -> Migration {
    Migration::chain(
        FULL_SEQUENCE_NAME,
        "Bring the schema to its current shape",
        catalog(),
    )
}
