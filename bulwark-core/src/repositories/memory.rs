//! In-memory attempt store.
//!
//! Suitable for single-process deployments and tests. Histories are sharded
//! by identity in a [`DashMap`]; an insert only holds the guard for its own
//! entry, so writers for different identities never contend and writers for
//! the same identity each append their own record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::{
    Error, IdentityKey,
    attempt::{AttemptRecord, NewAttempt},
    repositories::{AttemptRepository, AttemptRepositoryProvider, RepositoryProvider},
};

#[derive(Default)]
pub struct MemoryAttemptRepository {
    attempts: DashMap<IdentityKey, Vec<AttemptRecord>>,
}

impl MemoryAttemptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all identities.
    pub fn len(&self) -> usize {
        self.attempts.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AttemptRepository for MemoryAttemptRepository {
    async fn record_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, Error> {
        let record = attempt.into_record();
        self.attempts
            .entry(record.identity.clone())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn attempts_since(
        &self,
        identity: &IdentityKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>, Error> {
        let mut records: Vec<AttemptRecord> = self
            .attempts
            .get(identity)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|r| r.attempted_at >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        // Stable sort: equal timestamps keep insertion order.
        records.sort_by_key(|r| r.attempted_at);
        Ok(records)
    }

    async fn clear_attempts(&self, identity: &IdentityKey) -> Result<u64, Error> {
        Ok(self
            .attempts
            .remove(identity)
            .map(|(_, records)| records.len() as u64)
            .unwrap_or(0))
    }

    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        let mut removed = 0u64;
        self.attempts.retain(|_, records| {
            let before_len = records.len();
            records.retain(|r| r.attempted_at >= before);
            removed += (before_len - records.len()) as u64;
            !records.is_empty()
        });
        Ok(removed)
    }
}

/// Repository provider backed by [`MemoryAttemptRepository`].
#[derive(Default)]
pub struct MemoryRepositoryProvider {
    attempts: MemoryAttemptRepository,
}

impl MemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttemptRepositoryProvider for MemoryRepositoryProvider {
    type AttemptRepo = MemoryAttemptRepository;

    fn attempts(&self) -> &Self::AttemptRepo {
        &self.attempts
    }
}

#[async_trait]
impl RepositoryProvider for MemoryRepositoryProvider {
    async fn migrate(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn identity(email: &str) -> IdentityKey {
        IdentityKey::parse(email).unwrap()
    }

    #[tokio::test]
    async fn test_record_and_read_back() {
        let repo = MemoryAttemptRepository::new();
        let record = repo
            .record_attempt(NewAttempt::failure(identity("a@example.com")).ip_address(Some("10.1.1.1")))
            .await
            .unwrap();

        let records = repo
            .attempts_since(&identity("a@example.com"), Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(records, vec![record]);
    }

    #[tokio::test]
    async fn test_attempts_since_orders_oldest_first_and_filters() {
        let repo = MemoryAttemptRepository::new();
        let now = Utc::now();
        let key = identity("a@example.com");

        for offset in [5, 30, 1, 10] {
            repo.record_attempt(NewAttempt::failure(key.clone()).at(now - Duration::minutes(offset)))
                .await
                .unwrap();
        }

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
    async fn test_same_timestamp_keeps_insertion_order() {
        let repo = MemoryAttemptRepository::new();
        let at = Utc::now();
        let key = identity("a@example.com");

        let first = repo
            .record_attempt(NewAttempt::failure(key.clone()).at(at))
            .await
            .unwrap();
        let second = repo
            .record_attempt(NewAttempt::success(key.clone()).at(at))
            .await
            .unwrap();

        let records = repo.attempts_since(&key, at).await.unwrap();
        assert_eq!(records, vec![first, second]);
    }

    #[tokio::test]
    async fn test_identities_are_isolated() {
        let repo = MemoryAttemptRepository::new();
        repo.record_attempt(NewAttempt::failure(identity("a@example.com")))
            .await
            .unwrap();

        let records = repo
            .attempts_since(&identity("b@example.com"), Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writes_are_not_lost() {
        let repo = Arc::new(MemoryAttemptRepository::new());
        let key = identity("burst@example.com");

        let handles: Vec<_> = (0..64)
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
        assert_eq!(records.len(), 64);
        assert_eq!(repo.len(), 64);
    }

    #[tokio::test]
    async fn test_clear_attempts() {
        let repo = MemoryAttemptRepository::new();
        for _ in 0..3 {
            repo.record_attempt(NewAttempt::failure(identity("a@example.com")))
                .await
                .unwrap();
            repo.record_attempt(NewAttempt::failure(identity("b@example.com")))
                .await
                .unwrap();
        }

        assert_eq!(repo.clear_attempts(&identity("a@example.com")).await.unwrap(), 3);
        assert_eq!(repo.clear_attempts(&identity("a@example.com")).await.unwrap(), 0);
        assert_eq!(repo.len(), 3);
    }

    #[tokio::test]
    async fn test_cleanup_old_attempts() {
        let repo = MemoryAttemptRepository::new();
        let now = Utc::now();
        let key = identity("a@example.com");

        repo.record_attempt(NewAttempt::failure(key.clone()).at(now - Duration::days(8)))
            .await
            .unwrap();
        repo.record_attempt(NewAttempt::failure(identity("old@example.com")).at(now - Duration::days(9)))
            .await
            .unwrap();
        repo.record_attempt(NewAttempt::failure(key.clone()).at(now - Duration::minutes(1)))
            .await
            .unwrap();

        let removed = repo.cleanup_old_attempts(now - Duration::days(7)).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.len(), 1);
    }
}
