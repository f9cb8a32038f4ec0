//! Migration descriptors and ledger rows

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Namespace used when a descriptor does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// A migration handed over by the orchestrator, already ordered and checksum-verified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationDescriptor {
    pub level: i64,
    pub comment: String,
    pub script: String,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub directives: IndexMap<String, String>,
    /// Deprecated; use `directives.audit` instead.
    #[serde(default)]
    pub audit: Option<bool>,
}

impl MigrationDescriptor {
    /// Create a descriptor in the default namespace with no directives
    pub fn new(
        level: i64,
        comment: impl Into<String>,
        script: impl Into<String>,
        timestamp: DateTime<Utc>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            level,
            comment: comment.into(),
            script: script.into(),
            timestamp,
            checksum: checksum.into(),
            namespace: None,
            directives: IndexMap::new(),
            audit: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_directive(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.directives.insert(key.into(), value.into());
        self
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Timestamp as stored in the ledger
    pub fn epoch_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// One applied, auditable migration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub level: i64,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
    pub checksum: String,
    pub namespace: String,
}

/// Rebuild a point in time from stored epoch milliseconds
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}
