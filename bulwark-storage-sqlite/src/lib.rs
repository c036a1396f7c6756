//! SQLite attempt store for bulwark.
//!
//! Attempts are kept in a single `login_attempts` table. Every login writes
//! one row with a plain `INSERT`, so concurrent requests never contend on a
//! shared counter row.

pub mod migrations;
pub mod repositories;

pub use repositories::{SqliteAttemptRepository, SqliteRepositoryProvider};

use bulwark_core::{Error, error::StorageError};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

/// Connection holder for a SQLite database.
#[derive(Debug)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`, creating the database file if needed.
    ///
    /// In-memory databases (`sqlite::memory:`) live only as long as the pool.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| {
                tracing::error!(error = %e, "Invalid SQLite connection URL");
                StorageError::Connection(format!("Invalid SQLite connection URL: {e}"))
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to connect to SQLite");
                StorageError::Connection("Failed to connect to SQLite".to_string())
            })?;

        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn into_repository_provider(self) -> SqliteRepositoryProvider {
        SqliteRepositoryProvider::new(self.pool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulwark_core::RepositoryProvider;

    #[tokio::test]
    async fn test_connect_memory_and_migrate() {
        let storage = SqliteStorage::connect("sqlite::memory:")
            .await
            .expect("Failed to connect");
        let provider = storage.into_repository_provider();

        provider.migrate().await.expect("Failed to migrate");
        provider.health_check().await.expect("Health check failed");
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = SqliteStorage::connect("postgres://localhost/db").await;
        assert!(result.unwrap_err().is_storage_error());
    }
}
