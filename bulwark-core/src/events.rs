use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{IdentityKey, error::EventError};

/// Reason why an account was unlocked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnlockReason {
    /// Account was unlocked via password reset
    PasswordReset,
    /// Administrator manually unlocked the account
    AdminAction,
}

/// Security events emitted while tracking login attempts.
///
/// Events are notifications for audit logging and alerting. They are never
/// part of the decision path: a failing handler does not change the outcome
/// of a login.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Emitted when a login attempt fails.
    LoginFailed {
        /// The identity that was attempted
        identity: IdentityKey,
        /// Number of failed attempts in the current window, including this one
        failed_attempts: u32,
        /// IP address of the client (if available)
        ip_address: Option<String>,
        /// When the attempt occurred
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a login succeeds and the failure streak is reset.
    LoginSucceeded {
        identity: IdentityKey,
        ip_address: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a failed attempt starts a lockout episode.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        /// The identity that was locked
        identity: IdentityKey,
        /// Number of failed attempts that triggered the lockout
        failed_attempts: u32,
        /// When the lockout will expire
        locked_until: DateTime<Utc>,
        /// IP address of the last failed attempt (if available)
        ip_address: Option<String>,
        /// When the lockout was triggered
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an account's attempt history is cleared explicitly.
    AccountUnlocked {
        identity: IdentityKey,
        reason: UnlockReason,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    /// The identity the event concerns.
    pub fn identity(&self) -> &IdentityKey {
        match self {
            Event::LoginFailed { identity, .. }
            | Event::LoginSucceeded { identity, .. }
            | Event::AccountLocked { identity, .. }
            | Event::AccountUnlocked { identity, .. } => identity,
        }
    }
}

/// A trait for handling events emitted by the event bus
///
/// Implementors of this trait can be registered with the [`EventBus`] to receive and process events.
///
/// # Examples
///
/// ```
/// # use bulwark_core::events::{Event, EventHandler};
/// # use bulwark_core::error::EventError;
/// # use async_trait::async_trait;
/// struct AuditLog;
///
/// #[async_trait]
/// impl EventHandler for AuditLog {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         println!("security event for {}", event.identity());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that can emit events and register event handlers
///
/// Handlers are called in registration order. The first handler error stops
/// delivery and is returned to the emitter.
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}
