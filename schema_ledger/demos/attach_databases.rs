//! Applies migrations that span a main database and an attached `aux` database.
//!
//! RUST_LOG=schema_ledger=debug cargo run --example attach_databases

use chrono::Utc;
use schema_ledger::config::AttachedDatabase;
use schema_ledger::{migrate, Config, MigrationDescriptor};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{ConnectOptions, Row};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = std::env::temp_dir().join(format!("schema_ledger_demo_{}", std::process::id()));
    std::fs::create_dir_all(&dir)?;
    let aux_path = dir.join("aux.sqlite");

    let mut config = Config::new(dir.join("main.sqlite").to_string_lossy());
    config.connection.databases.push(AttachedDatabase {
        path: aux_path.to_string_lossy().into_owned(),
        alias: "aux".to_string(),
    });
    let mut driver = schema_ledger::SqliteDriver::new(config)?;

    let migrations = [MigrationDescriptor::new(
        1,
        "create aux.baz",
        "CREATE TABLE IF NOT EXISTS aux.baz (id INTEGER, value INTEGER);
         INSERT INTO aux.baz VALUES (1, 100), (2, 200), (3, 300);",
        Utc::now(),
        "demo-1",
    )];
    migrate(&mut driver, &migrations).await?;

    let mut aux = SqliteConnectOptions::new().filename(&aux_path).connect().await?;
    for row in sqlx::query("SELECT id, value FROM baz").fetch_all(&mut aux).await? {
        println!("id={} value={}", row.get::<i64, _>("id"), row.get::<i64, _>("value"));
    }

    std::fs::remove_dir_all(&dir)?;
    Ok(())
}
