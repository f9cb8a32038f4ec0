//! Utilities for schema_ledger
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

pub use logging::init_logging;
pub use naming::{format_name, is_valid_identifier, quote_identifier};
