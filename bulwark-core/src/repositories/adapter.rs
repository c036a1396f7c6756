use crate::{
    Error, IdentityKey,
    attempt::{AttemptRecord, NewAttempt},
    repositories::{AttemptRepository, RepositoryProvider},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Adapter that wraps a RepositoryProvider and implements [`AttemptRepository`]
pub struct AttemptRepositoryAdapter<R: RepositoryProvider> {
    provider: Arc<R>,
}

impl<R: RepositoryProvider> AttemptRepositoryAdapter<R> {
    pub fn new(provider: Arc<R>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<R: RepositoryProvider> AttemptRepository for AttemptRepositoryAdapter<R> {
    async fn record_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, Error> {
        self.provider.attempts().record_attempt(attempt).await
    }

    async fn attempts_since(
        &self,
        identity: &IdentityKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>, Error> {
        self.provider.attempts().attempts_since(identity, since).await
    }

    async fn clear_attempts(&self, identity: &IdentityKey) -> Result<u64, Error> {
        self.provider.attempts().clear_attempts(identity).await
    }

    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
        self.provider.attempts().cleanup_old_attempts(before).await
    }
}
