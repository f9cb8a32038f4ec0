use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use schema_ledger::config::{self, Config};
use schema_ledger::utils::logging::init_logging;
use schema_ledger::{migrate, MigrationDescriptor, MigrationDriver, SqliteDriver};

/// Maintenance commands for a schema_ledger database
#[derive(Parser)]
#[command(name = "schema_ledger", version, about)]
struct Cli {
    /// TOML or YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Database file, used when no configuration file is given
    #[arg(short, long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the ledger and lock tables
    Ensure,
    /// Drop the ledger table
    Drop,
    /// Print applied migrations as JSON lines
    List,
    /// Clear a lock left behind by a crashed run
    Unlock,
    /// Apply a single script under the migration lock
    Run {
        #[arg(long)]
        level: i64,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        namespace: Option<String>,
        script: PathBuf,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    match (&cli.config, &cli.database) {
        (Some(path), _) => Ok(config::load_from_file(path)?),
        (None, Some(database)) => Ok(Config::new(database.clone())),
        (None, None) => bail!("either --config or --database is required"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.logging)?;
    let mut driver = SqliteDriver::new(config)?;

    match cli.command {
        Command::Ensure => {
            driver.connect().await?;
            let result = driver.ensure_migrations().await;
            driver.disconnect().await?;
            result?;
            tracing::info!("Migrations table ensured");
        }
        Command::Drop => {
            driver.connect().await?;
            let result = driver.drop_migrations().await;
            driver.disconnect().await?;
            result?;
            tracing::info!("Migrations table dropped");
        }
        Command::List => {
            driver.connect().await?;
            let result = driver.get_migrations().await;
            driver.disconnect().await?;
            for row in result? {
                println!("{}", serde_json::to_string(&row)?);
            }
        }
        Command::Unlock => {
            driver.connect().await?;
            let result = driver.force_unlock_migrations().await;
            driver.disconnect().await?;
            result?;
            tracing::info!("Migrations unlocked");
        }
        Command::Run {
            level,
            comment,
            namespace,
            script,
        } => {
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("failed to read {}", script.display()))?;
            let checksum = format!("{:x}", md5::compute(text.as_bytes()));
            let comment = comment.unwrap_or_else(|| {
                script
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

            let mut migration =
                MigrationDescriptor::new(level, comment, text, Utc::now(), checksum);
            migration.namespace = namespace;

            let outcomes = migrate(&mut driver, std::slice::from_ref(&migration)).await?;
            tracing::info!(migration = level, outcome = ?outcomes.first(), "Migration applied");
        }
    }

    Ok(())
}
