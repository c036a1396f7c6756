//! Repository traits for data access layer
//!
//! This module defines the repository interfaces that services use to interact with storage.
//!
//! # Trait Hierarchy
//!
//! - [`AttemptRepository`] defines the operations on the login attempt log
//! - [`AttemptRepositoryProvider`] gives access to a backend's attempt repository
//! - [`RepositoryProvider`] adds lifecycle methods (migrations, health checks)
//!
//! Storage backends implement the repository and the provider; services only
//! ever see an [`AttemptRepository`], usually through [`AttemptRepositoryAdapter`].

pub mod adapter;
pub mod attempt;
pub mod memory;

pub use adapter::AttemptRepositoryAdapter;
pub use attempt::AttemptRepository;
pub use memory::{MemoryAttemptRepository, MemoryRepositoryProvider};

use async_trait::async_trait;

use crate::Error;

/// Provider trait for attempt repository access.
pub trait AttemptRepositoryProvider: Send + Sync + 'static {
    /// The attempt repository implementation type
    type AttemptRepo: AttemptRepository;

    /// Get the attempt repository
    fn attempts(&self) -> &Self::AttemptRepo;
}

/// Provider trait that storage implementations must implement.
///
/// # Example
///
/// ```rust,ignore
/// use bulwark_core::repositories::*;
///
/// struct MyStorage { attempts: MyAttemptRepository }
///
/// impl AttemptRepositoryProvider for MyStorage {
///     type AttemptRepo = MyAttemptRepository;
///     fn attempts(&self) -> &Self::AttemptRepo { &self.attempts }
/// }
///
/// #[async_trait]
/// impl RepositoryProvider for MyStorage {
///     async fn migrate(&self) -> Result<(), Error> { /* ... */ }
///     async fn health_check(&self) -> Result<(), Error> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait RepositoryProvider: AttemptRepositoryProvider {
    /// Run migrations for all repositories
    async fn migrate(&self) -> Result<(), Error>;

    /// Health check for all repositories
    async fn health_check(&self) -> Result<(), Error>;
}
