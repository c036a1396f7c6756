//! Schema migration traits shared by bulwark storage backends.
//!
//! A backend provides a [`MigrationManager`] that records applied versions in
//! a tracking table and a list of [`Migration`]s, each with a unique version.

use async_trait::async_trait;
use sqlx::Database;
use thiserror::Error;

/// Name of the table that records applied migrations.
pub const MIGRATION_TABLE: &str = "_bulwark_migrations";

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration failed: {0}")]
    Migration(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

#[async_trait]
pub trait Migration<DB: Database>: Send + Sync {
    /// Execute the migration
    async fn up<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Rollback the migration
    async fn down<'a>(&'a self, conn: &'a mut <DB as Database>::Connection) -> Result<()>;

    /// Unique version number for ordering migrations
    fn version(&self) -> i64;

    /// Human readable name of the migration
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    /// Milliseconds since the unix epoch
    pub applied_at: i64,
}

#[async_trait]
pub trait MigrationManager<DB: Database>: Send + Sync {
    fn get_migration_table_name(&self) -> &str {
        MIGRATION_TABLE
    }

    /// Initialize migration tracking table
    async fn initialize(&self) -> Result<()>;

    /// Apply pending migrations
    async fn up(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Rollback migrations
    async fn down(&self, migrations: &[Box<dyn Migration<DB>>]) -> Result<()>;

    /// Get list of applied migrations
    async fn get_applied_migrations(&self) -> Result<Vec<MigrationRecord>>;

    /// Check if specific migration was applied
    async fn is_applied(&self, version: i64) -> Result<bool>;
}

/// Check that migration versions are strictly increasing.
///
/// Managers call this before applying anything so that a misordered or
/// duplicated version never leaves the schema half migrated.
pub fn check_versions(versions: impl IntoIterator<Item = i64>) -> Result<()> {
    let mut previous: Option<i64> = None;
    for version in versions {
        if let Some(prev) = previous
            && version <= prev
        {
            return Err(MigrationError::Migration(format!(
                "migration version {version} must be greater than {prev}"
            )));
        }
        previous = Some(version);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increasing_versions_pass() {
        assert!(check_versions([1, 2, 5]).is_ok());
        assert!(check_versions([]).is_ok());
    }

    #[test]
    fn test_duplicate_or_decreasing_versions_fail() {
        assert!(matches!(
            check_versions([1, 1]),
            Err(MigrationError::Migration(_))
        ));
        assert!(check_versions([2, 1]).is_err());
    }
}
