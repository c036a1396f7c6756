//! Lockout policy: a pure mapping from an attempt history to a lockout state.
//!
//! Nothing here touches storage or the clock. Callers fetch the records newer
//! than [`LockoutPolicy::horizon`], reading further back only when
//! [`LockoutPolicy::evaluate_since`] cannot decide, and pass the current
//! instant explicitly, which keeps the decision reproducible and testable.
//!
//! # Rules
//!
//! - Failures are counted over a rolling window; a successful login clears the
//!   streak for everything recorded after it.
//! - When the streak reaches `lockout_threshold`, a lockout episode starts at
//!   the triggering failure and lasts `lockout_duration`.
//! - Failures recorded while an episode is active neither extend it nor start
//!   a new one, and a success recorded during an episode does not end it.
//! - After an episode expires the streak is *not* reset. The next failure that
//!   still sees `lockout_threshold` failures in its window relocks immediately.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    LockoutConfig,
    attempt::{AttemptOutcome, AttemptRecord},
    id::AttemptId,
};

/// Derived lockout attributes for one identity at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutState {
    /// Failures since the later of the window start and the last success
    pub failed_attempts_in_window: u32,
    /// Whether a lockout episode is active
    pub is_locked: bool,
    /// End of the active episode, `None` when not locked
    pub lockout_ends_at: Option<DateTime<Utc>>,
    /// Whether the client must pass a CAPTCHA before credentials are checked
    pub requires_captcha: bool,
    /// Failures left before lockout, never negative
    pub attempts_remaining: u32,
    /// Remaining-attempt count at or below which a warning is surfaced
    pub warning_threshold: u32,
    /// The failure that started the active episode
    #[serde(skip)]
    pub(crate) triggered_by: Option<AttemptId>,
}

impl LockoutState {
    /// State with no friction: no failures, no captcha, not locked.
    pub fn unrestricted(config: &LockoutConfig) -> Self {
        Self {
            failed_attempts_in_window: 0,
            is_locked: false,
            lockout_ends_at: None,
            requires_captcha: false,
            attempts_remaining: config.lockout_threshold,
            warning_threshold: config.warning_threshold,
            triggered_by: None,
        }
    }

    /// Remaining attempts when a warning should be shown to the user.
    ///
    /// Returns `None` while locked, when there are no failures to warn about,
    /// when nothing is left, or when the remaining count is still above the
    /// warning threshold.
    pub fn warning_attempts_remaining(&self) -> Option<u32> {
        if self.is_locked
            || self.failed_attempts_in_window == 0
            || self.attempts_remaining == 0
            || self.attempts_remaining > self.warning_threshold
        {
            None
        } else {
            Some(self.attempts_remaining)
        }
    }

    /// Seconds until the lockout ends, measured from now.
    pub fn retry_after_seconds(&self) -> Option<i64> {
        self.retry_after_seconds_at(Utc::now())
    }

    pub fn retry_after_seconds_at(&self, now: DateTime<Utc>) -> Option<i64> {
        self.lockout_ends_at
            .map(|until| (until - now).num_seconds().max(0))
    }

    /// Id of the failure that started the active lockout episode.
    pub fn triggered_by(&self) -> Option<&AttemptId> {
        self.triggered_by.as_ref()
    }

    /// Project the state onto the snapshot handed to clients.
    pub fn to_status(&self) -> SecurityStatus {
        SecurityStatus {
            requires_captcha: self.requires_captcha,
            is_locked: self.is_locked,
            lockout_ends_at: self.lockout_ends_at,
            attempts_remaining: self.warning_attempts_remaining(),
        }
    }
}

/// Status snapshot consumed by the login form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityStatus {
    pub requires_captcha: bool,
    pub is_locked: bool,
    pub lockout_ends_at: Option<DateTime<Utc>>,
    /// Only present when the user should be warned
    pub attempts_remaining: Option<u32>,
}

impl SecurityStatus {
    /// Snapshot that reveals nothing and asks for nothing.
    pub fn clear() -> Self {
        Self {
            requires_captcha: false,
            is_locked: false,
            lockout_ends_at: None,
            attempts_remaining: None,
        }
    }

    /// Snapshot used when the attempt history cannot be read.
    ///
    /// The state is unknown, so extra friction is required instead of
    /// reporting the account as safe.
    pub fn fail_closed() -> Self {
        Self {
            requires_captcha: true,
            ..Self::clear()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    config: LockoutConfig,
}

impl LockoutPolicy {
    pub fn new(config: LockoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LockoutConfig {
        &self.config
    }

    /// Where a read for an evaluation at `now` starts.
    ///
    /// Older records can still matter when lockout episodes chain; see
    /// [`evaluate_since`](Self::evaluate_since).
    pub fn horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.evaluation_horizon()
    }

    /// Evaluate a complete attempt history at `now`.
    ///
    /// `records` must be ordered oldest first; ties keep insertion order. Each
    /// record counts on its own, so a burst of concurrent failures sharing one
    /// timestamp is counted in full.
    pub fn evaluate(&self, records: &[AttemptRecord], now: DateTime<Utc>) -> LockoutState {
        self.replay(records, None, now)
    }

    /// Evaluate a history that only holds the records at or after `since`.
    ///
    /// Whether a failure starts an episode depends on whether an earlier
    /// episode was still running, which in turn depends on older failures. The
    /// evaluation is only exact from an anchor: an instant, far enough past
    /// `since` for every streak to be fully visible, with no failure at or over
    /// the threshold in the `lockout_duration` before it. No episode can be
    /// active at an anchor, whatever came before `since`.
    ///
    /// Returns `None` when the records contain no anchor and an older history
    /// is needed.
    pub fn evaluate_since(
        &self,
        records: &[AttemptRecord],
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<LockoutState> {
        let anchor = self.anchor(records, since, now)?;
        Some(self.replay(records, Some(anchor), now))
    }

    /// Times of failures whose streak reached the lockout threshold.
    fn qualifying_failures(
        &self,
        records: &[AttemptRecord],
        now: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let threshold = self.config.lockout_threshold as usize;
        let mut streak: VecDeque<DateTime<Utc>> = VecDeque::new();
        let mut qualifying = Vec::new();

        for record in records.iter().filter(|r| r.attempted_at <= now) {
            match record.outcome {
                AttemptOutcome::Success => streak.clear(),
                AttemptOutcome::Failure => {
                    self.push_failure(&mut streak, record.attempted_at);
                    if streak.len() >= threshold {
                        qualifying.push(record.attempted_at);
                    }
                }
            }
        }

        qualifying
    }

    fn anchor(
        &self,
        records: &[AttemptRecord],
        since: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let duration = self.config.lockout_duration;
        // Streaks of failures before this may be missing older records.
        let exact_from = since + self.config.window;
        let earliest = exact_from + duration;

        let qualifying: Vec<_> = self
            .qualifying_failures(records, now)
            .into_iter()
            .filter(|&at| at >= exact_from)
            .collect();

        std::iter::once(earliest)
            .chain(qualifying.iter().map(|&at| at + duration))
            .filter(|&candidate| candidate >= earliest && candidate <= now)
            .find(|&candidate| {
                !qualifying
                    .iter()
                    .any(|&at| candidate - duration < at && at <= candidate)
            })
    }

    fn push_failure(&self, streak: &mut VecDeque<DateTime<Utc>>, at: DateTime<Utc>) {
        streak.push_back(at);
        while streak
            .front()
            .is_some_and(|&first| first < at - self.config.window)
        {
            streak.pop_front();
        }
    }

    /// Single chronological pass. Episodes are only tracked for failures after
    /// `anchor`; none can be active at the anchor itself.
    fn replay(
        &self,
        records: &[AttemptRecord],
        anchor: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> LockoutState {
        let threshold = self.config.lockout_threshold as usize;

        let mut streak: VecDeque<DateTime<Utc>> = VecDeque::new();
        let mut episode_end: Option<DateTime<Utc>> = None;
        let mut triggered_by: Option<&AttemptId> = None;

        for record in records.iter().filter(|r| r.attempted_at <= now) {
            match record.outcome {
                AttemptOutcome::Success => {
                    streak.clear();
                }
                AttemptOutcome::Failure => {
                    let at = record.attempted_at;
                    self.push_failure(&mut streak, at);

                    if anchor.is_some_and(|anchor| at <= anchor) {
                        continue;
                    }

                    if episode_end.is_some_and(|end| at < end) {
                        continue;
                    }

                    if streak.len() >= threshold {
                        episode_end = Some(at + self.config.lockout_duration);
                        triggered_by = Some(&record.id);
                    }
                }
            }
        }

        let window_start = now - self.config.window;
        let failed_attempts_in_window =
            streak.iter().filter(|&&at| at >= window_start).count() as u32;

        let is_locked = episode_end.is_some_and(|end| end > now);
        let lockout_ends_at = if is_locked { episode_end } else { None };

        LockoutState {
            failed_attempts_in_window,
            is_locked,
            lockout_ends_at,
            requires_captcha: failed_attempts_in_window >= self.config.captcha_threshold
                || is_locked,
            attempts_remaining: self
                .config
                .lockout_threshold
                .saturating_sub(failed_attempts_in_window),
            warning_threshold: self.config.warning_threshold,
            triggered_by: triggered_by.filter(|_| is_locked).cloned(),
        }
    }
}
