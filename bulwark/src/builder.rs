//! Builder pattern for constructing Bulwark instances
//!
//! This module provides a type-safe builder for creating [`Bulwark`] instances with
//! compile-time validation of storage configuration.
//!
//! # Example
//!
//! ```rust,no_run
//! use bulwark::BulwarkBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build with SQLite and auto-migration
//!     let bulwark = BulwarkBuilder::new()
//!         .with_sqlite("sqlite::memory:")
//!         .await?
//!         .apply_migrations(true)
//!         .build()
//!         .await?;
//!
//!     // Or keep attempts in memory
//!     let bulwark = BulwarkBuilder::new().with_memory().build().await?;
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use bulwark_core::{EventBus, EventHandler, LockoutConfig, RepositoryProvider};
use bulwark_core::repositories::MemoryRepositoryProvider;

use crate::Bulwark;

/// Errors that can occur when building a Bulwark instance.
#[derive(Debug, thiserror::Error)]
pub enum BulwarkBuilderError {
    /// Failed to connect to storage backend
    #[error("Storage connection failed: {0}")]
    StorageConnection(String),

    /// Failed to run database migrations
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Marker type indicating no storage has been configured yet.
///
/// This is the initial state of [`BulwarkBuilder`].
pub struct NoStorage;

/// Marker type indicating storage has been configured.
pub struct WithStorage<R: RepositoryProvider> {
    repositories: Arc<R>,
}

/// A type-safe builder for constructing [`Bulwark`] instances.
///
/// # Type States
///
/// - [`NoStorage`]: Initial state, storage must be configured
/// - [`WithStorage<R>`]: Storage configured, ready to build or add more configuration
pub struct BulwarkBuilder<Storage> {
    storage: Storage,
    lockout_config: LockoutConfig,
    event_handlers: Vec<Arc<dyn EventHandler>>,
    apply_migrations: bool,
}

impl Default for BulwarkBuilder<NoStorage> {
    fn default() -> Self {
        Self::new()
    }
}

impl BulwarkBuilder<NoStorage> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Lockout: enabled; CAPTCHA after 3 failures, 15 minute lockout after 5
    ///   failures within 15 minutes
    /// - Apply migrations: false
    pub fn new() -> Self {
        Self {
            storage: NoStorage,
            lockout_config: LockoutConfig::default(),
            event_handlers: Vec::new(),
            apply_migrations: false,
        }
    }

    fn with_storage<R: RepositoryProvider>(self, repositories: Arc<R>) -> BulwarkBuilder<WithStorage<R>> {
        BulwarkBuilder {
            storage: WithStorage { repositories },
            lockout_config: self.lockout_config,
            event_handlers: self.event_handlers,
            apply_migrations: self.apply_migrations,
        }
    }

    /// Keep attempts in process memory.
    ///
    /// Attempts are lost on restart and not shared between processes.
    pub fn with_memory(self) -> BulwarkBuilder<WithStorage<MemoryRepositoryProvider>> {
        self.with_storage(Arc::new(MemoryRepositoryProvider::new()))
    }

    /// Use any repository provider, e.g. a custom storage backend.
    pub fn with_repositories<R: RepositoryProvider>(
        self,
        repositories: Arc<R>,
    ) -> BulwarkBuilder<WithStorage<R>> {
        self.with_storage(repositories)
    }
}

#[cfg(feature = "sqlite")]
impl BulwarkBuilder<NoStorage> {
    /// Configure SQLite storage by connecting to the given URL.
    ///
    /// # Arguments
    ///
    /// * `url` - SQLite connection URL (e.g., "sqlite::memory:" or "sqlite://path/to/db.sqlite")
    pub async fn with_sqlite(
        self,
        url: &str,
    ) -> Result<BulwarkBuilder<WithStorage<crate::SqliteRepositoryProvider>>, BulwarkBuilderError>
    {
        let storage = crate::SqliteStorage::connect(url)
            .await
            .map_err(|e| BulwarkBuilderError::StorageConnection(e.to_string()))?;

        Ok(self.with_storage(Arc::new(storage.into_repository_provider())))
    }

    /// Configure SQLite storage with an existing connection pool.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bulwark::BulwarkBuilder;
    /// use sqlx::SqlitePool;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = SqlitePool::connect("sqlite::memory:").await?;
    ///
    /// let bulwark = BulwarkBuilder::new()
    ///     .with_sqlite_pool(pool)
    ///     .apply_migrations(true)
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_sqlite_pool(
        self,
        pool: sqlx::SqlitePool,
    ) -> BulwarkBuilder<WithStorage<crate::SqliteRepositoryProvider>> {
        self.with_storage(Arc::new(crate::SqliteRepositoryProvider::new(pool)))
    }
}

impl<R: RepositoryProvider> BulwarkBuilder<WithStorage<R>> {
    /// Configure lockout thresholds and durations.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use bulwark::{BulwarkBuilder, LockoutConfig};
    /// use chrono::Duration;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let bulwark = BulwarkBuilder::new()
    ///     .with_memory()
    ///     .with_lockout_config(LockoutConfig {
    ///         lockout_threshold: 10,
    ///         lockout_duration: Duration::minutes(30),
    ///         ..Default::default()
    ///     })
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_lockout_config(mut self, config: LockoutConfig) -> Self {
        self.lockout_config = config;
        self
    }

    /// Read the lockout configuration from `BULWARK_*` environment variables.
    ///
    /// See [`LockoutConfig::from_env`] for the variables.
    pub fn with_lockout_config_from_env(mut self) -> Result<Self, BulwarkBuilderError> {
        self.lockout_config = LockoutConfig::from_env()
            .map_err(|e| BulwarkBuilderError::InvalidConfiguration(e.to_string()))?;
        Ok(self)
    }

    /// Register a handler for login and lockout events.
    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handlers.push(handler);
        self
    }

    /// Set whether to automatically apply database migrations during build.
    ///
    /// Default: false
    pub fn apply_migrations(mut self, apply: bool) -> Self {
        self.apply_migrations = apply;
        self
    }

    /// Build the Bulwark instance.
    ///
    /// Validates the lockout configuration and, if `apply_migrations(true)`
    /// was called, applies migrations before returning.
    pub async fn build(self) -> Result<Bulwark<R>, BulwarkBuilderError> {
        if self.apply_migrations {
            self.storage
                .repositories
                .migrate()
                .await
                .map_err(|e| BulwarkBuilderError::Migration(e.to_string()))?;
        }

        let event_bus = EventBus::new();
        for handler in self.event_handlers {
            event_bus.register(handler).await;
        }

        Bulwark::from_builder(self.storage.repositories, self.lockout_config, event_bus)
    }
}
