//! Driver facade consumed by a migration orchestrator

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::db::connection::{loggable_url, Sessions};
use crate::db::executor::{MigrationExecutor, Outcome};
use crate::db::templates::SqlTemplates;
use crate::db::{ledger, lock};
use crate::directives::DirectiveProcessor;
use crate::error::{Error, Result};
use crate::migration::{LedgerRow, MigrationDescriptor};

/// Storage-side operations an orchestrator invokes
#[async_trait]
pub trait MigrationDriver: Send {
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    async fn ensure_migrations(&mut self) -> Result<()>;

    async fn drop_migrations(&mut self) -> Result<()>;

    /// Claim the migration lock, failing fast with [`Error::LockError`] when it is held
    async fn lock_migrations(&mut self) -> Result<()>;

    /// Release a lock claimed by this driver; [`Error::LockError`] otherwise
    async fn unlock_migrations(&mut self) -> Result<()>;

    async fn get_migrations(&mut self) -> Result<Vec<LedgerRow>>;

    async fn run_migration(&mut self, migration: &MigrationDescriptor) -> Result<Outcome>;
}

/// SQLite implementation of [`MigrationDriver`]
///
/// The migration lock is a row in the database, not a handle owned by this
/// value. Dropping a driver that still holds the lock closes its sessions but
/// leaves the row behind, and every later `lock_migrations` fails until it is
/// cleared. Use [`migrate`], which always releases the lock, or pair
/// `lock_migrations` with `unlock_migrations` yourself. A lock orphaned by a
/// crashed process is cleared with [`SqliteDriver::force_unlock_migrations`]
/// (the CLI's `unlock` command).
pub struct SqliteDriver {
    config: Config,
    sql: SqlTemplates,
    directives: DirectiveProcessor,
    sessions: Option<Sessions>,
    locked: bool,
}

impl SqliteDriver {
    /// Create a disconnected driver from a validated configuration
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            sql: SqlTemplates::new(&config.table),
            directives: DirectiveProcessor::new(config.quiet),
            config,
            sessions: None,
            locked: false,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.sessions.is_some()
    }

    /// Aliases attached to the user session while connected
    pub fn attached_databases(&self) -> &[String] {
        self.sessions
            .as_ref()
            .map(|sessions| sessions.attached())
            .unwrap_or_default()
    }

    /// Whether this driver currently holds the migration lock
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Delete the lock row regardless of who claimed it.
    ///
    /// For clearing a lock left behind by a process that died mid-run. The lock
    /// and ledger tables are created first so this works on a fresh database.
    pub async fn force_unlock_migrations(&mut self) -> Result<()> {
        let sql = &self.sql;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        ledger::ensure(sessions.ledger(), sql).await?;
        warn!(table = %self.config.table, "Forcing release of the migration lock");
        lock::unlock(sessions.lock(), sql).await?;
        self.locked = false;
        Ok(())
    }

    /// Record a migration that was applied but whose ledger write failed.
    ///
    /// This is the reconciliation hook for [`Error::WriteError`]: the script is
    /// not run again. Skip and audit directives are honored as in a normal run.
    pub async fn reconcile(&mut self, migration: &MigrationDescriptor) -> Result<Outcome> {
        let sql = &self.sql;
        let directives = self.directives;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        MigrationExecutor::new(sql, directives)
            .reconcile(sessions, migration)
            .await
    }
}

#[async_trait]
impl MigrationDriver for SqliteDriver {
    async fn connect(&mut self) -> Result<()> {
        if self.sessions.is_some() {
            return Err(Error::ConnectionError(format!(
                "Already connected to {}",
                loggable_url(&self.config.connection)
            )));
        }

        self.sessions = Some(Sessions::connect(&self.config.connection).await?);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let sessions = self.sessions.take().ok_or(Error::NotConnected)?;
        debug!("Disconnecting from {}", loggable_url(&self.config.connection));
        sessions.disconnect().await;
        Ok(())
    }

    async fn ensure_migrations(&mut self) -> Result<()> {
        let sql = &self.sql;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        ledger::ensure(sessions.ledger(), sql).await
    }

    async fn drop_migrations(&mut self) -> Result<()> {
        let sql = &self.sql;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        ledger::drop_table(sessions.ledger(), sql).await
    }

    async fn lock_migrations(&mut self) -> Result<()> {
        let sql = &self.sql;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        lock::lock(sessions.lock(), sql).await?;
        self.locked = true;
        Ok(())
    }

    async fn unlock_migrations(&mut self) -> Result<()> {
        let sql = &self.sql;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        // Only the driver that claimed the row may release it
        if !self.locked {
            return Err(Error::LockError(
                "Migrations are not locked by this driver".to_string(),
            ));
        }
        lock::unlock(sessions.lock(), sql).await?;
        self.locked = false;
        Ok(())
    }

    async fn get_migrations(&mut self) -> Result<Vec<LedgerRow>> {
        let sql = &self.sql;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        ledger::list(sessions.ledger(), sql).await
    }

    async fn run_migration(&mut self, migration: &MigrationDescriptor) -> Result<Outcome> {
        let directives = self.directives;
        let sql = &self.sql;
        let sessions = self.sessions.as_mut().ok_or(Error::NotConnected)?;
        MigrationExecutor::new(sql, directives)
            .run(sessions, migration)
            .await
    }
}

impl Drop for SqliteDriver {
    fn drop(&mut self) {
        if self.locked {
            warn!(
                table = %self.config.table,
                "Driver dropped while holding the migration lock; \
                 the lock row stays until it is force-unlocked"
            );
        }
    }
}

/// Apply `migrations` in order inside one connected, locked scope.
///
/// The lock is released whenever it was acquired and the driver is always
/// disconnected, whether the run succeeded or not. The first error is returned.
/// Application stops at the first failing migration.
pub async fn migrate<D>(driver: &mut D, migrations: &[MigrationDescriptor]) -> Result<Vec<Outcome>>
where
    D: MigrationDriver + ?Sized,
{
    driver.connect().await?;

    let result = run_locked(driver, migrations).await;
    let disconnected = driver.disconnect().await;

    match (result, disconnected) {
        (Err(e), Err(disconnect_err)) => {
            warn!("Failed to disconnect after failed migration run: {}", disconnect_err);
            Err(e)
        }
        (result, disconnected) => {
            let outcomes = result?;
            disconnected?;
            Ok(outcomes)
        }
    }
}

async fn run_locked<D>(driver: &mut D, migrations: &[MigrationDescriptor]) -> Result<Vec<Outcome>>
where
    D: MigrationDriver + ?Sized,
{
    driver.lock_migrations().await?;

    let result = run_all(driver, migrations).await;
    let unlocked = driver.unlock_migrations().await;

    match (result, unlocked) {
        // The run error is returned; the lock row may still be held
        (Err(e), Err(unlock_err)) => {
            warn!("Failed to unlock migrations after failed run: {}", unlock_err);
            Err(e)
        }
        (result, unlocked) => {
            let outcomes = result?;
            unlocked?;
            Ok(outcomes)
        }
    }
}

async fn run_all<D>(driver: &mut D, migrations: &[MigrationDescriptor]) -> Result<Vec<Outcome>>
where
    D: MigrationDriver + ?Sized,
{
    driver.ensure_migrations().await?;

    let mut outcomes = Vec::with_capacity(migrations.len());
    for migration in migrations {
        outcomes.push(driver.run_migration(migration).await?);
    }
    Ok(outcomes)
}
