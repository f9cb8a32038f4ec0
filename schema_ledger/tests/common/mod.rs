//! Shared fixtures for the driver integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Row};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use schema_ledger::config::AttachedDatabase;
use schema_ledger::{Config, MigrationDescriptor};

pub const CHECKSUM: &str = "401f1b790bf394cf6493425c1d7e33b0";

pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn main_path(&self) -> PathBuf {
        self.path("main.sqlite")
    }

    pub fn aux_path(&self) -> PathBuf {
        self.path("aux.sqlite")
    }

    pub fn config(&self) -> Config {
        let mut config = Config::new(self.main_path().to_str().unwrap());
        config.quiet = true;
        config
    }

    pub fn config_with_aux(&self) -> Config {
        let mut config = self.config();
        config.connection.databases.push(AttachedDatabase {
            path: self.aux_path().to_str().unwrap().to_string(),
            alias: "aux".to_string(),
        });
        config
    }
}

pub fn timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2016, 12, 1, 15, 14, 13).unwrap()
}

pub fn migration(level: i64, script: &str) -> MigrationDescriptor {
    MigrationDescriptor::new(level, "test migration", script, timestamp(), CHECKSUM)
}

/// An independent connection, outside the driver's sessions
pub async fn open(path: &Path) -> SqliteConnection {
    SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .connect()
        .await
        .unwrap()
}

pub async fn table_count(conn: &mut SqliteConnection, name: &str) -> i64 {
    sqlx::query("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .unwrap()
        .get(0)
}
