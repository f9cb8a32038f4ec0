//! schema_ledger: applies ordered SQL migrations to SQLite exactly once
//!
//! An external orchestrator discovers migrations and decides which are pending.
//! This crate does the storage side: it opens the sessions, serializes runs
//! across processes with a lock row, executes scripts, honors per-migration
//! directives and keeps a ledger of what was applied.

pub mod config;
pub mod db;
pub mod directives;
pub mod driver;
pub mod error;
pub mod migration;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use db::Outcome;
pub use directives::{Decision, Directive, DirectiveProcessor};
pub use driver::{migrate, MigrationDriver, SqliteDriver};
pub use error::{Error, Result};
pub use migration::{LedgerRow, MigrationDescriptor};

/// Load a configuration file, set up logging and build a disconnected driver
pub fn init(config_path: &str) -> Result<SqliteDriver> {
    let config = config::load_from_file(config_path)?;
    utils::logging::init_logging(&config.logging)?;
    SqliteDriver::new(config)
}
