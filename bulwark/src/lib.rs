//! # Bulwark
//!
//! Bulwark protects login endpoints against brute-force attacks. It records
//! every login attempt per account, asks for a CAPTCHA once failures pile up
//! and locks the account for a while when they keep coming.
//!
//! Lockout state is derived from the attempt log on every read instead of
//! being kept in counters, so concurrent logins for the same account never
//! lose or double count an attempt.
//!
//! ## Storage Support
//!
//! - SQLite (feature `sqlite`, enabled by default)
//! - In-memory, for single-process deployments and tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use bulwark::BulwarkBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bulwark = BulwarkBuilder::new()
//!         .with_sqlite("sqlite://bulwark.db")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     let status = bulwark.get_security_status("user@example.com").await;
//!     if status.requires_captcha {
//!         // Show the captcha widget
//!     }
//!     Ok(())
//! }
//! ```
use std::sync::Arc;

use bulwark_core::{
    EventBus, EventHandler, RepositoryProvider,
    error::{AuthError, ValidationError},
    repositories::AttemptRepositoryAdapter,
    services::{CredentialVerifier, LoginOrchestrator, SecurityStatusService, StatusWatcher},
};
use chrono::{DateTime, Utc};

mod builder;

pub use builder::{BulwarkBuilder, BulwarkBuilderError, NoStorage, WithStorage};

/// Re-export core types from bulwark_core
///
/// These types are commonly used when working with the Bulwark API.
pub use bulwark_core::{
    AttemptOutcome, AttemptRecord, Event, IdentityKey, LockoutConfig, LockoutState,
    SecurityStatus, UnlockReason,
    repositories::{MemoryAttemptRepository, MemoryRepositoryProvider},
    services::StatusUpdate,
};

/// Re-export storage backends
///
/// These storage implementations are available when the corresponding feature is enabled.
#[cfg(feature = "sqlite")]
pub use bulwark_storage_sqlite::{SqliteRepositoryProvider, SqliteStorage};

/// The attempt repository every Bulwark service runs on.
pub type AttemptRepo<R> = AttemptRepositoryAdapter<R>;

/// Errors that can occur when using Bulwark.
#[derive(Debug, thiserror::Error)]
pub enum BulwarkError {
    /// Wrong email or password
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Too many failed attempts; the account is locked until the given time
    #[error("Account locked until {locked_until}")]
    AccountLocked { locked_until: DateTime<Utc> },

    /// A CAPTCHA must be solved before credentials are checked
    #[error("Captcha verification required")]
    CaptchaRequired,

    /// The attempt log could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// The input or configuration was rejected
    #[error("Validation error: {0}")]
    Validation(String),

    /// An event handler failed where its result was required
    #[error("Event error: {0}")]
    Event(String),
}

impl BulwarkError {
    /// Seconds until a locked account can try again.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        match self {
            BulwarkError::AccountLocked { locked_until } => {
                Some((*locked_until - Utc::now()).num_seconds().max(0))
            }
            _ => None,
        }
    }
}

impl From<bulwark_core::Error> for BulwarkError {
    fn from(error: bulwark_core::Error) -> Self {
        use bulwark_core::Error;

        match error {
            Error::Auth(AuthError::InvalidCredentials) => BulwarkError::InvalidCredentials,
            Error::Auth(AuthError::AccountLocked { locked_until }) => {
                BulwarkError::AccountLocked { locked_until }
            }
            Error::Auth(AuthError::CaptchaRequired) => BulwarkError::CaptchaRequired,
            Error::Storage(e) => BulwarkError::Storage(e.to_string()),
            Error::Validation(e) => BulwarkError::Validation(e.to_string()),
            Error::Event(e) => BulwarkError::Event(e.to_string()),
        }
    }
}

impl From<ValidationError> for BulwarkError {
    fn from(error: ValidationError) -> Self {
        BulwarkError::Validation(error.to_string())
    }
}

/// The main lockout engine
///
/// `Bulwark` owns the repository provider and the services built on it.
/// Clone the [`Arc`]s it hands out to share them with request handlers.
///
/// # Example
///
/// ```rust,no_run
/// use bulwark::{Bulwark, MemoryRepositoryProvider};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let bulwark = Bulwark::new(Arc::new(MemoryRepositoryProvider::new()));
/// let state = bulwark
///     .record_failed_login("user@example.com", Some("203.0.113.7"), None)
///     .await;
/// # }
/// ```
pub struct Bulwark<R: RepositoryProvider> {
    repositories: Arc<R>,
    security: Arc<SecurityStatusService<AttemptRepo<R>>>,
    event_bus: EventBus,
}

impl<R: RepositoryProvider> Bulwark<R> {
    /// Create a new Bulwark instance with the default lockout configuration
    pub fn new(repositories: Arc<R>) -> Self {
        Self::assemble(repositories, LockoutConfig::default(), EventBus::new())
    }

    pub(crate) fn from_builder(
        repositories: Arc<R>,
        config: LockoutConfig,
        event_bus: EventBus,
    ) -> Result<Self, BulwarkBuilderError> {
        config
            .validate()
            .map_err(|e| BulwarkBuilderError::InvalidConfiguration(e.to_string()))?;

        Ok(Self::assemble(repositories, config, event_bus))
    }

    fn assemble(repositories: Arc<R>, config: LockoutConfig, event_bus: EventBus) -> Self {
        let attempts = Arc::new(AttemptRepositoryAdapter::new(repositories.clone()));
        let security = Arc::new(
            SecurityStatusService::new(attempts, config).with_event_bus(event_bus.clone()),
        );

        Self {
            repositories,
            security,
            event_bus,
        }
    }

    /// Replace the lockout configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BulwarkError::Validation`] if the configuration is inconsistent.
    pub fn with_lockout_config(self, config: LockoutConfig) -> Result<Self, BulwarkError> {
        config.validate()?;
        Ok(Self::assemble(self.repositories, config, self.event_bus))
    }

    /// Run migrations for all repositories
    pub async fn migrate(&self) -> Result<(), BulwarkError> {
        self.repositories
            .migrate()
            .await
            .map_err(|e| BulwarkError::Storage(e.to_string()))
    }

    /// Health check for all repositories
    pub async fn health_check(&self) -> Result<(), BulwarkError> {
        self.repositories
            .health_check()
            .await
            .map_err(|e| BulwarkError::Storage(e.to_string()))
    }

    /// The repository provider, for direct access to the attempt log.
    pub fn repositories(&self) -> Arc<R> {
        self.repositories.clone()
    }

    pub fn lockout_config(&self) -> &LockoutConfig {
        self.security.config()
    }

    /// The security status service, for sharing with request handlers.
    pub fn security(&self) -> Arc<SecurityStatusService<AttemptRepo<R>>> {
        self.security.clone()
    }

    /// Register a handler for login and lockout events.
    pub async fn register_event_handler(&self, handler: Arc<dyn EventHandler>) {
        self.event_bus.register(handler).await;
    }

    /// Status snapshot for the login form.
    ///
    /// Never fails: unreadable storage yields a snapshot that requires a CAPTCHA.
    pub async fn get_security_status(&self, email: &str) -> SecurityStatus {
        self.security.get_status(email).await
    }

    /// Full lockout state for an email address.
    pub async fn get_lockout_state(&self, email: &str) -> Result<LockoutState, BulwarkError> {
        Ok(self.security.evaluate(email).await?)
    }

    /// Record a failed login for an email address.
    ///
    /// Use this when credentials are checked outside of [`Bulwark::login`].
    pub async fn record_failed_login(
        &self,
        email: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<LockoutState, BulwarkError> {
        Ok(self
            .security
            .record_failure(email, ip_address, user_agent)
            .await?)
    }

    /// Record a successful login, resetting the failure streak.
    pub async fn record_successful_login(
        &self,
        email: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), BulwarkError> {
        Ok(self
            .security
            .record_success(email, ip_address, user_agent)
            .await?)
    }

    /// Unlock an account, e.g. after a password reset.
    ///
    /// Returns `true` if the account was locked.
    pub async fn unlock_account(
        &self,
        email: &str,
        reason: UnlockReason,
    ) -> Result<bool, BulwarkError> {
        Ok(self.security.unlock_account(email, reason).await?)
    }

    /// Build a login orchestrator that gates `verifier` behind the lockout checks.
    pub fn login<V: CredentialVerifier>(
        &self,
        verifier: Arc<V>,
    ) -> LoginOrchestrator<AttemptRepo<R>, V> {
        LoginOrchestrator::new(self.security.clone(), verifier)
    }

    /// Build a debounced status probe.
    pub fn status_watcher(&self, debounce: std::time::Duration) -> StatusWatcher<AttemptRepo<R>> {
        StatusWatcher::new(self.security.clone(), debounce)
    }

    /// Start the hourly retention cleanup task.
    pub fn start_cleanup_task(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        self.security.start_cleanup_task(shutdown)
    }
}
