//! Applies two migrations to a shared in-memory database and prints the ledger.
//!
//! RUST_LOG=schema_ledger=debug cargo run --example in_memory

use chrono::Utc;
use schema_ledger::{Config, MigrationDescriptor, MigrationDriver, SqliteDriver};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut config = Config::new("demo");
    config.connection.options.memory = true;
    let mut driver = SqliteDriver::new(config)?;

    let migrations = [
        MigrationDescriptor::new(
            1,
            "create foo",
            "CREATE TABLE foo (id INTEGER, value TEXT); INSERT INTO foo VALUES (1, 'foo');",
            Utc::now(),
            "demo-1",
        ),
        MigrationDescriptor::new(
            2,
            "create bar",
            "CREATE TABLE bar (id INTEGER, value TEXT); INSERT INTO bar VALUES (1, 'bar');",
            Utc::now(),
            "demo-2",
        ),
    ];

    // The database only lives while a session is open, so read the ledger
    // before disconnecting.
    driver.connect().await?;
    driver.lock_migrations().await?;
    driver.ensure_migrations().await?;
    for migration in &migrations {
        let outcome = driver.run_migration(migration).await?;
        tracing::info!(level = migration.level, ?outcome, "Applied");
    }
    let rows = driver.get_migrations().await?;
    driver.unlock_migrations().await?;
    driver.disconnect().await?;

    for row in rows {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}
