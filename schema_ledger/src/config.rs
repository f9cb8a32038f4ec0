//! Configuration handling for schema_ledger

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::naming;

/// Load configuration from a TOML or YAML file, chosen by extension
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let extension = Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
        .to_lowercase();

    let config: Config = match extension.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?,
        _ => toml::from_str(&config_str)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?,
    };

    config.validate()?;
    Ok(config)
}

fn default_table() -> String {
    "migrations".to_string()
}

/// Represents the complete driver configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Ledger table name; the lock table is `<table>_lock`
    #[serde(default = "default_table")]
    pub table: String,
    /// Suppress directive warnings
    #[serde(default)]
    pub quiet: bool,
    pub connection: ConnectionConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Configuration for a database file with every other setting defaulted
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            table: default_table(),
            quiet: false,
            connection: ConnectionConfig {
                path: path.into(),
                options: ConnectionOptions::default(),
                databases: Vec::new(),
            },
            logging: None,
        }
    }

    /// Reject table names and aliases that cannot be used as bare identifiers
    pub fn validate(&self) -> Result<()> {
        if !naming::is_valid_identifier(&self.table) {
            return Err(Error::ConfigError(format!(
                "Invalid table name: {:?}",
                self.table
            )));
        }

        for database in &self.connection.databases {
            if !naming::is_valid_identifier(&database.alias) {
                return Err(Error::ConfigError(format!(
                    "Invalid alias {:?} for attached database {}",
                    database.alias, database.path
                )));
            }
        }

        if self.connection.path.is_empty() {
            return Err(Error::ConfigError("Connection path is empty".to_string()));
        }

        Ok(())
    }
}

/// Target database and its auxiliary attachments
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ConnectionConfig {
    pub path: String,
    #[serde(default)]
    pub options: ConnectionOptions,
    #[serde(default)]
    pub databases: Vec<AttachedDatabase>,
}

/// Engine-specific open options
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Open `path` as a named, shared in-memory database
    pub memory: bool,
    pub read_only: bool,
    pub create_if_missing: bool,
    pub busy_timeout_ms: u64,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            memory: false,
            read_only: false,
            create_if_missing: true,
            busy_timeout_ms: 5000,
        }
    }
}

/// An auxiliary database attached to the user session under an alias
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AttachedDatabase {
    pub path: String,
    #[serde(rename = "as")]
    pub alias: String,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}
