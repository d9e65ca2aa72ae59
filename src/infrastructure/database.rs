//! Pooled SQLite connection

use crate::config::DatabaseSettings;
use log::info;
use sqlx::SqlitePool;
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::ops::Deref;
use std::str::FromStr;

/// Owns the process-wide pool. Constructed once at startup and handed to the service
/// container; the binary keeps a clone of the pool to drain it at shutdown.
pub struct DatabaseConnection {
    connection: SqlitePool,
}

impl DatabaseConnection {
    pub async fn connect(settings: &DatabaseSettings) -> Result<DatabaseConnection, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&settings.url)?.create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(settings.idle_timeout)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(options)
            .await?;

        info!(
            "database pool ready (max {} connections)",
            settings.max_connections
        );

        Ok(DatabaseConnection { connection: pool })
    }

    pub fn from_pool(pool: SqlitePool) -> DatabaseConnection {
        DatabaseConnection { connection: pool }
    }

    /// Creates the tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!().run(&self.connection).await
    }
}

impl Deref for DatabaseConnection {
    type Target = SqlitePool;

    fn deref(&self) -> &Self::Target {
        &self.connection
    }
}
