//! Core functionality for the bulwark project
//!
//! This crate contains the login attempt log, the lockout policy derived from
//! it and the services that answer "is this account locked, and how close is
//! it to being locked".
//!
//! Lockout state is never stored. Every read fetches the attempts inside the
//! evaluation horizon and recomputes the state with [`LockoutPolicy`], so
//! concurrent logins only ever append independent records.
//!
//! Storage backends implement [`repositories::AttemptRepository`] and
//! [`RepositoryProvider`]; an in-memory backend ships with this crate.
//!
//! See [`services::SecurityStatusService`] for status queries and
//! [`services::LoginOrchestrator`] for gating a credential check.
pub mod attempt;
pub mod config;
pub mod error;
pub mod events;
pub mod id;
pub mod identity;
pub mod policy;
pub mod repositories;
pub mod services;
pub mod validation;

pub use attempt::{AttemptOutcome, AttemptRecord, NewAttempt};
pub use config::LockoutConfig;
pub use error::Error;
pub use events::{Event, EventBus, EventHandler, UnlockReason};
pub use id::AttemptId;
pub use identity::IdentityKey;
pub use policy::{LockoutPolicy, LockoutState, SecurityStatus};
pub use repositories::RepositoryProvider;
pub use services::{CredentialVerifier, LoginOrchestrator, SecurityStatusService, StatusWatcher};
