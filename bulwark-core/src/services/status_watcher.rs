//! Debounced status probe.
//!
//! A login form asks for the security status while the user types. Each new
//! request supersedes the ones before it: a request only fetches after the
//! debounce delay if nothing newer arrived meanwhile, and only publishes if
//! nothing newer arrived while it was fetching. A stale response can
//! therefore never overwrite a fresher one.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use std::time::Duration;

use tokio::{sync::watch, task::JoinHandle};

use crate::{
    policy::SecurityStatus, repositories::AttemptRepository, services::SecurityStatusService,
};

/// The latest status published by a [`StatusWatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub email: String,
    pub status: SecurityStatus,
}

pub struct StatusWatcher<R: AttemptRepository> {
    service: Arc<SecurityStatusService<R>>,
    debounce: Duration,
    generation: Arc<AtomicU64>,
    sender: Arc<watch::Sender<Option<StatusUpdate>>>,
}

impl<R: AttemptRepository> StatusWatcher<R> {
    pub fn new(service: Arc<SecurityStatusService<R>>, debounce: Duration) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            service,
            debounce,
            generation: Arc::new(AtomicU64::new(0)),
            sender: Arc::new(sender),
        }
    }

    /// Receiver for published statuses. Starts out as `None`.
    pub fn subscribe(&self) -> watch::Receiver<Option<StatusUpdate>> {
        self.sender.subscribe()
    }

    /// Ask for the status of `email` once the debounce delay has passed.
    ///
    /// Every call supersedes all earlier requests. Values that cannot be an
    /// email (no `@`) are not fetched; `None` is returned for them.
    pub fn request(&self, email: &str) -> Option<JoinHandle<()>> {
        let token = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !email.contains('@') {
            return None;
        }

        let email = email.to_string();
        let service = Arc::clone(&self.service);
        let generation = Arc::clone(&self.generation);
        let sender = Arc::clone(&self.sender);
        let debounce = self.debounce;

        Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if generation.load(Ordering::SeqCst) != token {
                return;
            }

            let status = service.get_status(&email).await;
            if generation.load(Ordering::SeqCst) != token {
                tracing::trace!("Discarding superseded status response");
                return;
            }

            sender.send_replace(Some(StatusUpdate { email, status }));
        }))
    }

    /// Supersede every in-flight request without issuing a new one.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Error, IdentityKey, LockoutConfig,
        attempt::{AttemptRecord, NewAttempt},
        repositories::MemoryAttemptRepository,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::AtomicUsize;

    const DEBOUNCE: Duration = Duration::from_millis(20);

    /// Memory repository that counts reads
    #[derive(Default)]
    struct CountingRepository {
        inner: MemoryAttemptRepository,
        reads: AtomicUsize,
    }

    #[async_trait]
    impl AttemptRepository for CountingRepository {
        async fn record_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, Error> {
            self.inner.record_attempt(attempt).await
        }

        async fn attempts_since(
            &self,
            identity: &IdentityKey,
            since: DateTime<Utc>,
        ) -> Result<Vec<AttemptRecord>, Error> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.attempts_since(identity, since).await
        }

        async fn clear_attempts(&self, identity: &IdentityKey) -> Result<u64, Error> {
            self.inner.clear_attempts(identity).await
        }

        async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error> {
            self.inner.cleanup_old_attempts(before).await
        }
    }

    fn watcher() -> (
        StatusWatcher<CountingRepository>,
        Arc<SecurityStatusService<CountingRepository>>,
        Arc<CountingRepository>,
    ) {
        let repo = Arc::new(CountingRepository::default());
        let service = Arc::new(SecurityStatusService::new(
            repo.clone(),
            LockoutConfig::default(),
        ));
        (StatusWatcher::new(service.clone(), DEBOUNCE), service, repo)
    }

    #[tokio::test]
    async fn test_publishes_status_after_debounce() {
        let (watcher, service, _) = watcher();
        for _ in 0..3 {
            service
                .record_failure("clerk@example.com", None, None)
                .await
                .unwrap();
        }

        let mut rx = watcher.subscribe();
        assert!(rx.borrow().is_none());

        watcher.request("clerk@example.com").unwrap().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let update = rx.borrow_and_update().clone().unwrap();
        assert_eq!(update.email, "clerk@example.com");
        assert!(update.status.requires_captcha);
    }

    #[tokio::test]
    async fn test_only_latest_request_fetches() {
        let (watcher, _, repo) = watcher();
        let mut rx = watcher.subscribe();

        let first = watcher.request("c@example.com").unwrap();
        let second = watcher.request("cl@example.com").unwrap();
        let third = watcher.request("clerk@example.com").unwrap();
        for handle in [first, second, third] {
            handle.await.unwrap();
        }

        assert_eq!(repo.reads.load(Ordering::SeqCst), 1);
        let update = rx.borrow_and_update().clone().unwrap();
        assert_eq!(update.email, "clerk@example.com");
    }

    #[tokio::test]
    async fn test_cancel_discards_in_flight_request() {
        let (watcher, _, repo) = watcher();
        let rx = watcher.subscribe();

        let handle = watcher.request("clerk@example.com").unwrap();
        watcher.cancel();
        handle.await.unwrap();

        assert!(!rx.has_changed().unwrap());
        assert_eq!(repo.reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_email_input_supersedes_without_fetching() {
        let (watcher, _, repo) = watcher();
        let rx = watcher.subscribe();

        let handle = watcher.request("clerk@example.com").unwrap();
        assert!(watcher.request("clerk").is_none());
        handle.await.unwrap();

        assert!(!rx.has_changed().unwrap());
        assert_eq!(repo.reads.load(Ordering::SeqCst), 0);
    }
}
