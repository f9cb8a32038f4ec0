//! Logging utilities for schema_ledger
//!
//! This module provides logging setup and configuration.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Parse a configured level name, defaulting to INFO
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging based on configuration
///
/// Events go to the configured file when one is set, otherwise to stdout when
/// `stdout` is enabled. With neither, no subscriber is installed.
pub fn init_logging(config: &Option<LoggingConfig>) -> Result<()> {
    let config = match config {
        Some(cfg) => cfg,
        None => return Ok(()),
    };

    // RUST_LOG still applies; the configured level is added for this crate
    let level = parse_level(&config.level);
    let directive: Directive = format!("schema_ledger={}", level)
        .parse()
        .map_err(|e| Error::ConfigError(format!("Invalid log directive: {}", e)))?;
    let env_filter = EnvFilter::from_default_env().add_directive(directive);

    let writer = match (&config.file, config.stdout) {
        (Some(file_path), _) => BoxMakeWriter::new(Mutex::new(open_log_file(file_path)?)),
        (None, true) => BoxMakeWriter::new(std::io::stdout),
        (None, false) => return Ok(()),
    };

    let builder = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(writer);

    // Only the event format differs between text and JSON output
    let installed = if config.format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    installed.map_err(|e| Error::ConfigError(e.to_string()))
}

/// Create the log file, along with any missing parent directories
fn open_log_file(file_path: &str) -> Result<File> {
    if let Some(parent) = Path::new(file_path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(File::create(file_path)?)
}
