//! Migration lock
//!
//! A run is in progress while row `id = 1` exists in `<table>_lock`. The primary
//! key makes the claim atomic across processes sharing the database file.
//! Acquisition never retries; callers layer their own backoff on [`Error::LockError`].

use sqlx::sqlite::SqliteConnection;
use sqlx::Executor;
use tracing::debug;

use crate::db::templates::SqlTemplates;
use crate::error::{Error, Result};

/// Claim the lock row
pub async fn lock(conn: &mut SqliteConnection, sql: &SqlTemplates) -> Result<()> {
    debug!("Lock migrations ...");
    conn.execute(sql.lock_migrations_lock_table.as_str())
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                Error::LockError("Migrations are already locked by another run".to_string())
            }
            _ => Error::LockError(format!("Failed to lock migrations: {}", e)),
        })?;
    Ok(())
}

/// Release the lock row, then give other waiters a chance to observe it
pub async fn unlock(conn: &mut SqliteConnection, sql: &SqlTemplates) -> Result<()> {
    debug!("Unlock migrations ...");
    conn.execute(sql.unlock_migrations_lock_table.as_str())
        .await
        .map_err(|e| Error::LockError(format!("Failed to unlock migrations: {}", e)))?;

    tokio::task::yield_now().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqliteConnectOptions;
    use sqlx::ConnectOptions;

    #[tokio::test]
    async fn second_claim_fails_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("lock.sqlite"))
            .create_if_missing(true);
        let mut first = options.connect().await.unwrap();
        let mut second = options.connect().await.unwrap();
        let sql = SqlTemplates::new("migrations");

        lock(&mut first, &sql).await.unwrap();
        assert!(matches!(lock(&mut second, &sql).await, Err(Error::LockError(_))));

        unlock(&mut first, &sql).await.unwrap();
        lock(&mut second, &sql).await.unwrap();
        unlock(&mut second, &sql).await.unwrap();
    }

    #[tokio::test]
    async fn unlock_without_lock_table_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut conn = SqliteConnectOptions::new()
            .filename(dir.path().join("lock.sqlite"))
            .create_if_missing(true)
            .connect()
            .await
            .unwrap();

        let sql = SqlTemplates::new("migrations");
        assert!(matches!(unlock(&mut conn, &sql).await, Err(Error::LockError(_))));
    }
}
