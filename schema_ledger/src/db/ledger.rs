//! Ledger of applied migrations
//!
//! This module creates, drops, reads and appends to the ledger table.

use sqlx::sqlite::SqliteConnection;
use sqlx::{Executor, FromRow};
use tracing::debug;

use crate::db::templates::SqlTemplates;
use crate::error::{Error, Result};
use crate::migration::{from_epoch_millis, LedgerRow, MigrationDescriptor};

#[derive(FromRow)]
struct StoredRow {
    level: i64,
    comment: Option<String>,
    timestamp: i64,
    checksum: Option<String>,
    namespace: String,
}

impl TryFrom<StoredRow> for LedgerRow {
    type Error = Error;

    fn try_from(row: StoredRow) -> Result<Self> {
        let timestamp = from_epoch_millis(row.timestamp).ok_or_else(|| {
            Error::QueryError(format!(
                "Migration {} has an out of range timestamp: {}",
                row.level, row.timestamp
            ))
        })?;

        Ok(LedgerRow {
            level: row.level,
            comment: row.comment.unwrap_or_default(),
            timestamp,
            checksum: row.checksum.unwrap_or_default(),
            namespace: row.namespace,
        })
    }
}

/// Create the ledger and lock tables if they do not exist
pub async fn ensure(conn: &mut SqliteConnection, sql: &SqlTemplates) -> Result<()> {
    debug!("Ensure migrations ...");
    conn.execute(sql.ensure_migrations_tables.as_str())
        .await
        .map_err(|e| Error::SchemaError(format!("Failed to ensure migrations table: {}", e)))?;
    Ok(())
}

/// Drop the ledger table
pub async fn drop_table(conn: &mut SqliteConnection, sql: &SqlTemplates) -> Result<()> {
    debug!("Drop migrations ...");
    conn.execute(sql.drop_migrations_tables.as_str())
        .await
        .map_err(|e| Error::SchemaError(format!("Failed to drop migrations table: {}", e)))?;
    Ok(())
}

/// All ledger rows in insertion order
pub async fn list(conn: &mut SqliteConnection, sql: &SqlTemplates) -> Result<Vec<LedgerRow>> {
    let rows: Vec<StoredRow> = sqlx::query_as(&sql.retrieve_migrations)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| Error::QueryError(format!("Failed to retrieve migrations: {}", e)))?;

    rows.into_iter().map(LedgerRow::try_from).collect()
}

/// Append one row for an applied, auditable migration
pub async fn record(
    conn: &mut SqliteConnection,
    sql: &SqlTemplates,
    migration: &MigrationDescriptor,
    comment: &str,
) -> Result<()> {
    // Parameter order follows insert_migration.sql
    sqlx::query(&sql.insert_migration)
        .bind(migration.level)
        .bind(comment)
        .bind(migration.epoch_millis()) // ms since epoch
        .bind(migration.checksum.as_str())
        .bind(migration.namespace())
        .execute(&mut *conn)
        .await
        .map_err(|source| Error::WriteError {
            migration: Box::new(migration.clone()),
            source,
        })?;
    Ok(())
}
