//! Login attempt records.
//!
//! Every login attempt, successful or not, becomes one immutable
//! [`AttemptRecord`]. Lockout state is never stored; it is derived from the
//! records by [`LockoutPolicy`](crate::policy::LockoutPolicy) on every read.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{IdentityKey, error::ValidationError, id::AttemptId};

/// Result of a single login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure => "failure",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AttemptOutcome::Failure)
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AttemptOutcome::Success),
            "failure" => Ok(AttemptOutcome::Failure),
            other => Err(ValidationError::InvalidField(format!(
                "Unknown attempt outcome: {other}"
            ))),
        }
    }
}

/// A stored login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: AttemptId,
    pub identity: IdentityKey,
    pub outcome: AttemptOutcome,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn is_failure(&self) -> bool {
        self.outcome.is_failure()
    }
}

/// Insert payload for an attempt store.
///
/// The store assigns the [`AttemptId`]; everything else is supplied by the caller.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub identity: IdentityKey,
    pub outcome: AttemptOutcome,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

impl NewAttempt {
    pub fn new(identity: IdentityKey, outcome: AttemptOutcome) -> Self {
        Self {
            identity,
            outcome,
            ip_address: None,
            user_agent: None,
            attempted_at: Utc::now(),
        }
    }

    pub fn failure(identity: IdentityKey) -> Self {
        Self::new(identity, AttemptOutcome::Failure)
    }

    pub fn success(identity: IdentityKey) -> Self {
        Self::new(identity, AttemptOutcome::Success)
    }

    pub fn ip_address(mut self, ip_address: Option<&str>) -> Self {
        self.ip_address = ip_address.map(str::to_string);
        self
    }

    pub fn user_agent(mut self, user_agent: Option<&str>) -> Self {
        self.user_agent = user_agent.map(str::to_string);
        self
    }

    /// Override the attempt timestamp (imports, replays and tests).
    pub fn at(mut self, attempted_at: DateTime<Utc>) -> Self {
        self.attempted_at = attempted_at;
        self
    }

    /// Turn the payload into a record with a freshly generated id.
    pub fn into_record(self) -> AttemptRecord {
        AttemptRecord {
            id: AttemptId::new_random(),
            identity: self.identity,
            outcome: self.outcome,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            attempted_at: self.attempted_at,
        }
    }
}
