//! SQLite implementation of the login attempt repository.

use async_trait::async_trait;
use bulwark_core::{
    AttemptId, AttemptOutcome, AttemptRecord, Error, IdentityKey, NewAttempt,
    error::StorageError, repositories::AttemptRepository,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// SQLite repository for the login attempt log.
pub struct SqliteAttemptRepository {
    pool: SqlitePool,
}

impl SqliteAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Internal struct for query results
#[derive(Debug, sqlx::FromRow)]
struct SqliteLoginAttempt {
    id: String,
    identity: String,
    outcome: String,
    ip_address: Option<String>,
    user_agent: Option<String>,
    attempted_at: i64,
}

impl TryFrom<SqliteLoginAttempt> for AttemptRecord {
    type Error = Error;

    fn try_from(row: SqliteLoginAttempt) -> Result<Self, Self::Error> {
        let outcome: AttemptOutcome = row.outcome.parse().map_err(|_| {
            StorageError::Database(format!("Invalid attempt outcome: {}", row.outcome))
        })?;
        let attempted_at = DateTime::from_timestamp_millis(row.attempted_at).ok_or_else(|| {
            StorageError::Database(format!("Invalid attempt timestamp: {}", row.attempted_at))
        })?;

        Ok(AttemptRecord {
            id: AttemptId::from(row.id),
            identity: IdentityKey::from_normalized(row.identity),
            outcome,
            ip_address: row.ip_address,
            user_agent: row.user_agent,
            attempted_at,
        })
    }
}

#[async_trait]
impl AttemptRepository for SqliteAttemptRepository {
    async fn record_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, Error> {
        let record = attempt.into_record();

        let row = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            INSERT INTO login_attempts (id, identity, outcome, ip_address, user_agent, attempted_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id, identity, outcome, ip_address, user_agent, attempted_at
            "#,
        )
        .bind(record.id.as_str())
        .bind(record.identity.as_str())
        .bind(record.outcome.as_str())
        .bind(record.ip_address.as_deref())
        .bind(record.user_agent.as_deref())
        .bind(record.attempted_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to record login attempt");
            StorageError::Database("Failed to record login attempt".to_string())
        })?;

        row.try_into()
    }

    async fn attempts_since(
        &self,
        identity: &IdentityKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>, Error> {
        let rows = sqlx::query_as::<_, SqliteLoginAttempt>(
            r#"
            SELECT id, identity, outcome, ip_address, user_agent, attempted_at
            FROM login_attempts
            WHERE identity = ? AND attempted_at >= ?
            ORDER BY attempted_at ASC, rowid ASC
            "#,
        )
        .bind(identity.as_str())
        .bind(since.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to read login attempts");
            StorageError::Database("Failed to read login attempts".to_string())
        })?;

        rows.into_iter().map(AttemptRecord::try_from).collect()
    }

    async fn clear_attempts(&self, identity: &IdentityKey) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE identity = ?")
            .bind(identity.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to clear attempts");
                StorageError::Database("Failed to clear attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }

    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempted_at < ?")
            .bind(before.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to cleanup old attempts");
                StorageError::Database("Failed to cleanup old attempts".to_string())
            })?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::{SqliteMigrationManager, all_migrations};
    use bulwark_migration::MigrationManager;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .expect("Failed to create pool");

        let manager = SqliteMigrationManager::new(pool.clone());
        manager
            .initialize()
            .await
            .expect("Failed to initialize migrations");
        manager
            .up(&all_migrations())
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn identity(email: &str) -> IdentityKey {
        IdentityKey::parse(email).unwrap()
    }

    #[tokio::test]
    async fn test_record_attempt() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);

        let record = repo
            .record_attempt(
                NewAttempt::failure(identity("test@example.com"))
                    .ip_address(Some("192.168.1.1"))
                    .user_agent(Some("Mozilla/5.0")),
            )
            .await
            .expect("Failed to record attempt");

        assert_eq!(record.identity.as_str(), "test@example.com");
        assert_eq!(record.outcome, AttemptOutcome::Failure);
        assert_eq!(record.ip_address, Some("192.168.1.1".to_string()));
        assert_eq!(record.user_agent, Some("Mozilla/5.0".to_string()));
        assert!(record.id.as_str().starts_with("att_"));
    }

    #[tokio::test]
    async fn test_timestamps_round_trip_at_millisecond_precision() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        let at = Utc::now() - Duration::minutes(3);

        let record = repo
            .record_attempt(NewAttempt::success(identity("test@example.com")).at(at))
            .await
            .unwrap();

        assert_eq!(record.attempted_at.timestamp_millis(), at.timestamp_millis());
        let read = repo
            .attempts_since(&identity("test@example.com"), at - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(read, vec![record]);
    }

    #[tokio::test]
    async fn test_attempts_since_orders_and_filters() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        let key = identity("test@example.com");
        let now = Utc::now();

        for offset in [5, 30, 1, 10] {
            repo.record_attempt(NewAttempt::failure(key.clone()).at(now - Duration::minutes(offset)))
                .await
                .unwrap();
        }
        repo.record_attempt(NewAttempt::failure(identity("other@example.com")))
            .await
            .unwrap();

        let records = repo
            .attempts_since(&key, now - Duration::minutes(20))
            .await
            .unwrap();
        let offsets: Vec<_> = records
            .iter()
            .map(|r| (now - r.attempted_at).num_minutes())
            .collect();
        assert_eq!(offsets, vec![10, 5, 1]);
    }

    #[tokio::test]
    async fn test_same_millisecond_keeps_insertion_order() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        let key = identity("test@example.com");
        let at = Utc::now();

        let mut expected = Vec::new();
        for outcome in [
            AttemptOutcome::Failure,
            AttemptOutcome::Success,
            AttemptOutcome::Failure,
        ] {
            expected.push(
                repo.record_attempt(NewAttempt::new(key.clone(), outcome).at(at))
                    .await
                    .unwrap(),
            );
        }

        let records = repo
            .attempts_since(&key, at - Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(records, expected);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_all_kept() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let manager = SqliteMigrationManager::new(pool.clone());
        manager.initialize().await.unwrap();
        manager.up(&all_migrations()).await.unwrap();

        let repo = Arc::new(SqliteAttemptRepository::new(pool));
        let key = identity("burst@example.com");

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let repo = repo.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    repo.record_attempt(NewAttempt::failure(key)).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let records = repo
            .attempts_since(&key, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(records.len(), 25);
    }

    #[tokio::test]
    async fn test_clear_attempts() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);

        for _ in 0..3 {
            repo.record_attempt(NewAttempt::failure(identity("test1@example.com")))
                .await
                .unwrap();
            repo.record_attempt(NewAttempt::failure(identity("test2@example.com")))
                .await
                .unwrap();
        }

        let cleared = repo
            .clear_attempts(&identity("test1@example.com"))
            .await
            .unwrap();
        assert_eq!(cleared, 3);

        let since = Utc::now() - Duration::hours(1);
        assert!(
            repo.attempts_since(&identity("test1@example.com"), since)
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            repo.attempts_since(&identity("test2@example.com"), since)
                .await
                .unwrap()
                .len(),
            3
        );
    }

    #[tokio::test]
    async fn test_cleanup_old_attempts() {
        let repo = SqliteAttemptRepository::new(setup_test_db().await);
        let key = identity("test@example.com");
        let now = Utc::now();

        repo.record_attempt(NewAttempt::failure(key.clone()).at(now - Duration::days(8)))
            .await
            .unwrap();
        repo.record_attempt(NewAttempt::failure(key.clone()).at(now - Duration::minutes(5)))
            .await
            .unwrap();

        let deleted = repo
            .cleanup_old_attempts(now - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(deleted, 1);

        let remaining = repo
            .attempts_since(&key, now - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_table_is_a_storage_error() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let repo = SqliteAttemptRepository::new(pool);

        let err = repo
            .attempts_since(&identity("test@example.com"), Utc::now())
            .await
            .unwrap_err();
        assert!(err.is_storage_error());
    }
}
