//! Error types for schema_ledger

use thiserror::Error;

use crate::migration::MigrationDescriptor;

/// Result type for schema_ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema_ledger
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Query error: {0}")]
    QueryError(String),

    /// The script ran but its ledger row could not be written.
    #[error("Failed to record migration {} ({}): {source}", .migration.level, .migration.comment)]
    WriteError {
        migration: Box<MigrationDescriptor>,
        #[source]
        source: sqlx::Error,
    },

    #[error("Migration {} ({}) failed: {source}", .migration.level, .migration.comment)]
    ScriptError {
        migration: Box<MigrationDescriptor>,
        #[source]
        source: sqlx::Error,
    },

    #[error("Driver is not connected")]
    NotConnected,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl Error {
    /// The migration that halted the run, for script and ledger failures
    pub fn migration(&self) -> Option<&MigrationDescriptor> {
        match self {
            Error::WriteError { migration, .. } | Error::ScriptError { migration, .. } => {
                Some(migration.as_ref())
            }
            _ => None,
        }
    }

    /// True when the schema change was applied but the ledger is missing its row.
    ///
    /// The orchestrator owns reconciliation; see [`crate::SqliteDriver::reconcile`].
    pub fn is_applied_but_unrecorded(&self) -> bool {
        matches!(self, Error::WriteError { .. })
    }
}

/// Convert Serde JSON errors to schema_ledger errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to schema_ledger errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

/// Convert YAML deserialization errors to schema_ledger errors
impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
