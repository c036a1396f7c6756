//! Security status service: per-identity lockout state derived from the attempt log.
//!
//! The service never stores counters. Every read fetches the attempts inside
//! the evaluation horizon and runs them through the [`LockoutPolicy`], so two
//! requests racing on the same identity can only ever disagree by the
//! attempts that one of them has not seen yet.
//!
//! # Example
//!
//! ```rust,ignore
//! use bulwark_core::{LockoutConfig, services::SecurityStatusService};
//!
//! let service = SecurityStatusService::new(repository, LockoutConfig::default());
//!
//! // Debounced probe from the login form
//! let status = service.get_status("user@example.com").await;
//! if status.requires_captcha {
//!     // Render the captcha widget
//! }
//!
//! // After a wrong password
//! let state = service.record_failure("user@example.com", Some("192.168.1.1"), None).await?;
//! ```

use std::sync::Arc;

use chrono::Utc;

use crate::{
    Error, IdentityKey, LockoutConfig,
    attempt::NewAttempt,
    events::{Event, EventBus, UnlockReason},
    policy::{LockoutPolicy, LockoutState, SecurityStatus},
    repositories::AttemptRepository,
};

/// How often the retention cleanup task runs.
const CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Service answering "is this account locked, and how close is it to being locked".
///
/// # Thread Safety
///
/// The service holds no mutable state of its own and can be shared across
/// tasks behind an `Arc`. Concurrency is delegated to the repository, whose
/// writes are independent inserts.
pub struct SecurityStatusService<R: AttemptRepository> {
    repository: Arc<R>,
    policy: LockoutPolicy,
    event_bus: Option<EventBus>,
}

impl<R: AttemptRepository> SecurityStatusService<R> {
    pub fn new(repository: Arc<R>, config: LockoutConfig) -> Self {
        Self {
            repository,
            policy: LockoutPolicy::new(config),
            event_bus: None,
        }
    }

    /// Attach an event bus that receives login and lockout events.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &LockoutConfig {
        self.policy.config()
    }

    pub fn is_enabled(&self) -> bool {
        self.config().enabled
    }

    /// Status snapshot for the login form.
    ///
    /// This never fails. An email that is not a valid identity gets the clear
    /// status, which is what an unknown account would get too. When the
    /// attempt log cannot be read the status fails closed and asks for a
    /// CAPTCHA.
    pub async fn get_status(&self, email: &str) -> SecurityStatus {
        let Ok(identity) = IdentityKey::parse(email) else {
            return SecurityStatus::clear();
        };

        match self.evaluate_identity(&identity).await {
            Ok(state) => state.to_status(),
            Err(e) => {
                tracing::error!(
                    identity = %identity,
                    error = %e,
                    "Failed to read login attempts, failing closed"
                );
                SecurityStatus::fail_closed()
            }
        }
    }

    /// Current lockout state for an email address.
    ///
    /// Unlike [`get_status`](Self::get_status) this surfaces validation and
    /// storage errors so callers on the login path can deny access.
    pub async fn evaluate(&self, email: &str) -> Result<LockoutState, Error> {
        let identity = IdentityKey::parse(email)?;
        self.evaluate_identity(&identity).await
    }

    /// Current lockout state for an already parsed identity.
    pub async fn evaluate_identity(&self, identity: &IdentityKey) -> Result<LockoutState, Error> {
        if !self.is_enabled() {
            return Ok(LockoutState::unrestricted(self.config()));
        }

        let now = Utc::now();
        let retention = self.config().retention_period;
        let mut lookback = self.config().evaluation_horizon();

        // Chained episodes can reach past the horizon; read further back until
        // the policy finds an anchor or the retention period is exhausted.
        loop {
            let since = now - lookback;
            let records = self.repository.attempts_since(identity, since).await?;

            if let Some(state) = self.policy.evaluate_since(&records, since, now) {
                return Ok(state);
            }

            if lookback >= retention {
                tracing::debug!(
                    identity = %identity,
                    "Evaluating retained history without an anchor"
                );
                return Ok(self.policy.evaluate(&records, now));
            }

            lookback = (lookback * 2).min(retention);
        }
    }

    /// Record a failed login and return the state that results from it.
    ///
    /// Emits [`Event::LoginFailed`], plus [`Event::AccountLocked`] when this
    /// particular failure started a lockout episode.
    pub async fn record_failure(
        &self,
        email: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<LockoutState, Error> {
        let identity = IdentityKey::parse(email)?;
        self.record_failure_for(&identity, ip_address, user_agent)
            .await
    }

    pub async fn record_failure_for(
        &self,
        identity: &IdentityKey,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<LockoutState, Error> {
        if !self.is_enabled() {
            return Ok(LockoutState::unrestricted(self.config()));
        }

        let record = self
            .repository
            .record_attempt(
                NewAttempt::failure(identity.clone())
                    .ip_address(ip_address)
                    .user_agent(user_agent),
            )
            .await?;

        let state = self.evaluate_identity(identity).await?;

        self.emit(Event::LoginFailed {
            identity: identity.clone(),
            failed_attempts: state.failed_attempts_in_window,
            ip_address: record.ip_address.clone(),
            timestamp: record.attempted_at,
        })
        .await;

        if let Some(locked_until) = state.lockout_ends_at
            && state.triggered_by() == Some(&record.id)
        {
            tracing::warn!(
                identity = %identity,
                failed_attempts = state.failed_attempts_in_window,
                locked_until = %locked_until,
                "Account locked after repeated failed logins"
            );

            self.emit(Event::AccountLocked {
                identity: identity.clone(),
                failed_attempts: state.failed_attempts_in_window,
                locked_until,
                ip_address: record.ip_address.clone(),
                timestamp: record.attempted_at,
            })
            .await;
        }

        Ok(state)
    }

    /// Record a successful login, which clears the failure streak.
    ///
    /// A success does not end an active lockout episode.
    pub async fn record_success(
        &self,
        email: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), Error> {
        let identity = IdentityKey::parse(email)?;
        self.record_success_for(&identity, ip_address, user_agent)
            .await
    }

    pub async fn record_success_for(
        &self,
        identity: &IdentityKey,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), Error> {
        if !self.is_enabled() {
            return Ok(());
        }

        let record = self
            .repository
            .record_attempt(
                NewAttempt::success(identity.clone())
                    .ip_address(ip_address)
                    .user_agent(user_agent),
            )
            .await?;

        self.emit(Event::LoginSucceeded {
            identity: identity.clone(),
            ip_address: record.ip_address,
            timestamp: record.attempted_at,
        })
        .await;

        Ok(())
    }

    /// Unlock an account by deleting its attempt history.
    ///
    /// Intended for administrators and the password reset flow.
    ///
    /// # Returns
    ///
    /// `true` if the account was locked before the call.
    pub async fn unlock_account(&self, email: &str, reason: UnlockReason) -> Result<bool, Error> {
        let identity = IdentityKey::parse(email)?;
        let was_locked = self.evaluate_identity(&identity).await?.is_locked;

        let removed = self.repository.clear_attempts(&identity).await?;
        tracing::info!(
            identity = %identity,
            removed = removed,
            was_locked = was_locked,
            reason = ?reason,
            "Cleared login attempts"
        );

        self.emit(Event::AccountUnlocked {
            identity,
            reason,
            timestamp: Utc::now(),
        })
        .await;

        Ok(was_locked)
    }

    /// Start the background retention task.
    ///
    /// Every hour, records older than the retention period are deleted.
    /// Evaluations never read past the retention period, so cleanup only
    /// removes records no evaluation looks at.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - A watch receiver that signals when to stop the task
    pub fn start_cleanup_task(
        &self,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let repository = Arc::clone(&self.repository);
        let retention = self.config().retention_period;

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(CLEANUP_INTERVAL);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let before = Utc::now() - retention;
                        match repository.cleanup_old_attempts(before).await {
                            Ok(count) if count > 0 => {
                                tracing::info!(
                                    count = count,
                                    "Cleaned up old login attempt records"
                                );
                            }
                            Err(e) => {
                                tracing::warn!(
                                    error = %e,
                                    "Failed to cleanup login attempt records"
                                );
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down login attempt cleanup task");
                        break;
                    }
                }
            }
        })
    }

    async fn emit(&self, event: Event) {
        if let Some(event_bus) = &self.event_bus
            && let Err(e) = event_bus.emit(&event).await
        {
            tracing::warn!(
                identity = %event.identity(),
                error = %e,
                "Security event handler failed"
            );
        }
    }
}
