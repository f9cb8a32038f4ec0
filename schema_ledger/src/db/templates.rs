//! SQL templates
//!
//! The stored SQL uses a `{table}` placeholder; the lock table is always
//! `{table}_lock`.

use crate::utils::naming::format_name;

const ENSURE_MIGRATIONS_TABLES: &str = include_str!("sql/ensure-migrations-tables.sql");
const RETRIEVE_MIGRATIONS: &str = include_str!("sql/retrieve-migrations.sql");
const DROP_MIGRATIONS_TABLES: &str = include_str!("sql/drop-migrations-tables.sql");
const LOCK_MIGRATIONS_LOCK_TABLE: &str = include_str!("sql/lock-migrations-lock-table.sql");
const UNLOCK_MIGRATIONS_LOCK_TABLE: &str = include_str!("sql/unlock-migrations-lock-table.sql");
const INSERT_MIGRATION: &str = include_str!("sql/insert-migration.sql");

/// SQL text for every ledger and lock operation, bound to one table name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplates {
    pub ensure_migrations_tables: String,
    pub retrieve_migrations: String,
    pub drop_migrations_tables: String,
    pub lock_migrations_lock_table: String,
    pub unlock_migrations_lock_table: String,
    pub insert_migration: String,
}

impl SqlTemplates {
    /// Substitute `table` into every template. The name must already be a valid identifier.
    pub fn new(table: &str) -> Self {
        let load = |template: &str| format_name(template, &[("table", table)]);

        Self {
            ensure_migrations_tables: load(ENSURE_MIGRATIONS_TABLES),
            retrieve_migrations: load(RETRIEVE_MIGRATIONS),
            drop_migrations_tables: load(DROP_MIGRATIONS_TABLES),
            lock_migrations_lock_table: load(LOCK_MIGRATIONS_LOCK_TABLE),
            unlock_migrations_lock_table: load(UNLOCK_MIGRATIONS_LOCK_TABLE),
            insert_migration: load(INSERT_MIGRATION),
        }
    }
}
