//! Database module for schema_ledger
//!
//! This module handles sessions, the migration lock, the ledger and script execution.

pub mod connection;
pub mod executor;
pub mod ledger;
pub mod lock;
pub mod templates;

// Re-export key types
pub use connection::Sessions;
pub use executor::{MigrationExecutor, Outcome};
pub use templates::SqlTemplates;
