//! Migration executor
//!
//! Runs one migration: directive check, optional skip, script execution and,
//! for auditable migrations, the ledger write.

use sqlx::Executor;
use tracing::{debug, warn};

use crate::db::connection::Sessions;
use crate::db::ledger;
use crate::db::templates::SqlTemplates;
use crate::directives::{Decision, DirectiveProcessor};
use crate::error::{Error, Result};
use crate::migration::MigrationDescriptor;

/// Terminal state of a successful migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Skipped by directive; nothing executed or recorded
    Skipped,
    /// Executed and written to the ledger
    Recorded,
    /// Executed without a ledger row
    Unaudited,
}

/// Executor for individual migrations
pub struct MigrationExecutor<'a> {
    sql: &'a SqlTemplates,
    directives: DirectiveProcessor,
}

impl<'a> MigrationExecutor<'a> {
    /// Create a new migration executor
    pub fn new(sql: &'a SqlTemplates, directives: DirectiveProcessor) -> Self {
        Self { sql, directives }
    }

    /// Apply one migration.
    ///
    /// A script failure yields [`Error::ScriptError`]; a ledger failure after a
    /// successful script yields [`Error::WriteError`]. Both carry the descriptor.
    ///
    /// A script that opens its own transaction and then fails would leave the
    /// user session holding SQLite's write lock, which blocks the lock release
    /// on the lock session. That transaction is rolled back before returning.
    pub async fn run(
        &self,
        sessions: &mut Sessions,
        migration: &MigrationDescriptor,
    ) -> Result<Outcome> {
        let decision = self.directives.resolve(migration);

        if decision.skip {
            debug!(
                "Skipping migration {}: {}\n{}",
                migration.level, migration.comment, migration.script
            );
            return Ok(Outcome::Skipped);
        }

        debug!(
            "Run migration {}: {}\n{}",
            migration.level, migration.comment, migration.script
        );
        if let Err(source) = sessions.user().execute(migration.script.as_str()).await {
            close_dangling_transaction(sessions).await;
            return Err(Error::ScriptError {
                migration: Box::new(migration.clone()),
                source,
            });
        }

        self.record(sessions, migration, &decision).await
    }

    /// Write the ledger row for a migration whose script has already been applied
    pub async fn reconcile(
        &self,
        sessions: &mut Sessions,
        migration: &MigrationDescriptor,
    ) -> Result<Outcome> {
        let decision = self.directives.resolve(migration);
        if decision.skip {
            return Ok(Outcome::Skipped);
        }
        self.record(sessions, migration, &decision).await
    }

    async fn record(
        &self,
        sessions: &mut Sessions,
        migration: &MigrationDescriptor,
        decision: &Decision,
    ) -> Result<Outcome> {
        if !decision.auditable {
            return Ok(Outcome::Unaudited);
        }

        ledger::record(sessions.ledger(), self.sql, migration, &decision.effective_comment).await?;
        Ok(Outcome::Recorded)
    }
}

/// Roll back a transaction the failed script left open on the user session.
///
/// Only the script's own `BEGIN` is undone; statements it ran in autocommit
/// mode stay applied. SQLite answers "no transaction is active" when there is
/// nothing to close, which is the common case.
async fn close_dangling_transaction(sessions: &mut Sessions) {
    match sessions.user().execute("ROLLBACK").await {
        Ok(_) => warn!("Rolled back a transaction left open by the failed migration"),
        Err(e) => debug!("No open transaction after failed migration: {}", e),
    }
}
