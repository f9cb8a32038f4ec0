//! Database connection handling
//!
//! A connected driver holds three sessions against the same database file: one
//! for the lock row, one for the ledger and one for user scripts. Auxiliary
//! databases are attached to the user session only.

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection, Executor};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::utils::naming::quote_identifier;

/// The three sessions of one connected driver
#[derive(Debug)]
pub struct Sessions {
    lock: SqliteConnection,
    ledger: SqliteConnection,
    user: SqliteConnection,
    attached: Vec<String>,
}

impl Sessions {
    /// Open all sessions and attach the configured auxiliary databases.
    ///
    /// On failure every session opened so far is closed before the error is returned.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let options = connect_options(config)?;
        debug!("Connecting to {}", loggable_url(config));

        let mut opened = Vec::with_capacity(3);
        for role in ["lock", "ledger", "user"] {
            match options.connect().await {
                Ok(conn) => opened.push(conn),
                Err(e) => {
                    close_all(opened).await;
                    return Err(Error::ConnectionError(format!(
                        "Failed to open {} session on {}: {}",
                        role,
                        loggable_url(config),
                        e
                    )));
                }
            }
        }

        let [lock, ledger, user]: [SqliteConnection; 3] = opened
            .try_into()
            .map_err(|_| Error::ConnectionError("Expected three sessions".to_string()))?;

        let mut sessions = Self {
            lock,
            ledger,
            user,
            attached: Vec::new(),
        };

        if let Err(e) = sessions.attach_databases(config).await {
            sessions.close().await;
            return Err(e);
        }

        debug!(attached = sessions.attached.len(), "Connected");
        Ok(sessions)
    }

    async fn attach_databases(&mut self, config: &ConnectionConfig) -> Result<()> {
        for database in &config.databases {
            // The path binds as a parameter; the alias is an identifier and cannot
            let sql = format!("ATTACH DATABASE ? AS {}", quote_identifier(&database.alias));
            sqlx::query(&sql)
                .bind(database.path.as_str())
                .persistent(false)
                .execute(&mut self.user)
                .await
                .map_err(|e| {
                    Error::ConnectionError(format!(
                        "Failed to attach {} as {}: {}",
                        database.path, database.alias, e
                    ))
                })?;

            debug!(alias = %database.alias, path = %database.path, "Attached database");
            self.attached.push(database.alias.clone());
        }

        Ok(())
    }

    /// Detach every auxiliary database, then close all sessions.
    ///
    /// Detach failures are logged and do not stop the teardown.
    pub async fn disconnect(mut self) {
        // Attached aliases are tracked so only successful attaches are detached
        for alias in std::mem::take(&mut self.attached) {
            let sql = format!("DETACH DATABASE {}", quote_identifier(&alias));
            if let Err(e) = self.user.execute(sql.as_str()).await {
                warn!(alias = %alias, error = %e, "Failed to detach database");
            }
        }

        self.close().await;
    }

    async fn close(self) {
        close_all(vec![self.lock, self.ledger, self.user]).await;
    }

    /// Session that claims and releases the lock row
    pub fn lock(&mut self) -> &mut SqliteConnection {
        &mut self.lock
    }

    /// Session that owns the ledger table
    pub fn ledger(&mut self) -> &mut SqliteConnection {
        &mut self.ledger
    }

    /// Session that runs migration scripts, with auxiliary databases attached
    pub fn user(&mut self) -> &mut SqliteConnection {
        &mut self.user
    }

    /// Aliases currently attached to the user session
    pub fn attached(&self) -> &[String] {
        &self.attached
    }
}

/// Build connect options shared by all three sessions
pub fn connect_options(config: &ConnectionConfig) -> Result<SqliteConnectOptions> {
    let busy_timeout = Duration::from_millis(config.options.busy_timeout_ms);

    let options = if config.options.memory {
        // A named shared-cache database, so every session sees the same data
        SqliteConnectOptions::from_str(&format!(
            "sqlite:{}?mode=memory&cache=shared",
            config.path
        ))
        .map_err(|e| Error::ConnectionError(format!("Invalid in-memory database name: {}", e)))?
    } else {
        SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.options.create_if_missing)
            .read_only(config.options.read_only)
    };

    Ok(options.busy_timeout(busy_timeout))
}

/// Connection string suitable for log output
pub fn loggable_url(config: &ConnectionConfig) -> String {
    if config.options.memory {
        format!("sqlite3::memory:{}", config.path)
    } else {
        format!("sqlite3:{}", config.path)
    }
}

async fn close_all(connections: Vec<SqliteConnection>) {
    for conn in connections {
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close session");
        }
    }
}
