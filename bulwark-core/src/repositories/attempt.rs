//! Repository trait for the login attempt log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    Error, IdentityKey,
    attempt::{AttemptRecord, NewAttempt},
};

/// Append-only store of login attempts.
///
/// Lockout state is derived from this log on every read, so implementations
/// never keep counters. Every call to [`record_attempt`](Self::record_attempt)
/// must be an independent insert: concurrent writers for the same identity
/// must each produce their own record, with no read-modify-write in between.
///
/// # Security Considerations
///
/// - Attempts are recorded for every syntactically valid email, whether or
///   not an account exists, so the log cannot be used for user enumeration.
/// - IP addresses and user agents are audit metadata and may be subject to
///   data retention regulations; see [`cleanup_old_attempts`](Self::cleanup_old_attempts).
/// - Any error is treated by callers as "cannot verify safety" and fails closed.
#[async_trait]
pub trait AttemptRepository: Send + Sync + 'static {
    /// Append one attempt and return the stored record.
    async fn record_attempt(&self, attempt: NewAttempt) -> Result<AttemptRecord, Error>;

    /// All attempts for `identity` at or after `since`, oldest first.
    ///
    /// Records sharing a timestamp are returned in insertion order.
    async fn attempts_since(
        &self,
        identity: &IdentityKey,
        since: DateTime<Utc>,
    ) -> Result<Vec<AttemptRecord>, Error>;

    /// Delete every attempt for `identity`, returning the number removed.
    ///
    /// Used by explicit unlocks (administrator action, password reset).
    async fn clear_attempts(&self, identity: &IdentityKey) -> Result<u64, Error>;

    /// Delete attempts older than `before`, returning the number removed.
    async fn cleanup_old_attempts(&self, before: DateTime<Utc>) -> Result<u64, Error>;
}
