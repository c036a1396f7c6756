use chrono::Duration;

use crate::error::ValidationError;

/// Configuration for failed-login friction and account lockout.
///
/// Thresholds count failures since the later of the start of the rolling
/// `window` and the last successful login. Once `captcha_threshold` failures
/// are reached the client must pass a CAPTCHA; at `lockout_threshold` the
/// account is locked for `lockout_duration`.
///
/// # Example
///
/// ```rust
/// use bulwark_core::LockoutConfig;
/// use chrono::Duration;
///
/// let config = LockoutConfig {
///     lockout_threshold: 10,
///     lockout_duration: Duration::minutes(30),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct LockoutConfig {
    /// Whether protection is active at all
    pub enabled: bool,
    /// Failures in the window after which a CAPTCHA is required
    pub captcha_threshold: u32,
    /// Failures in the window that lock the account
    pub lockout_threshold: u32,
    /// Rolling window over which failures are counted
    pub window: Duration,
    /// How long a lockout episode lasts
    pub lockout_duration: Duration,
    /// How long attempt records are kept before cleanup
    pub retention_period: Duration,
    /// Remaining-attempt count at or below which clients show a warning
    pub warning_threshold: u32,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            captcha_threshold: 3,
            lockout_threshold: 5,
            window: Duration::minutes(15),
            lockout_duration: Duration::minutes(15),
            retention_period: Duration::days(7),
            warning_threshold: 5,
        }
    }
}

impl LockoutConfig {
    /// A configuration with protection switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// How far back a status evaluation reads by default.
    ///
    /// A lockout triggered up to `lockout_duration` ago may still be active and
    /// was triggered by failures up to `window` before that. One more
    /// `lockout_duration` lets the usual case show that no older episode was
    /// still running when it started.
    pub fn evaluation_horizon(&self) -> Duration {
        self.window + self.lockout_duration * 2
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.lockout_threshold == 0 {
            return Err(ValidationError::InvalidConfig(
                "lockout_threshold must be at least 1".to_string(),
            ));
        }

        if self.captcha_threshold >= self.lockout_threshold {
            return Err(ValidationError::InvalidConfig(format!(
                "captcha_threshold ({}) must be lower than lockout_threshold ({})",
                self.captcha_threshold, self.lockout_threshold
            )));
        }

        if self.window <= Duration::zero() || self.lockout_duration <= Duration::zero() {
            return Err(ValidationError::InvalidConfig(
                "window and lockout_duration must be positive".to_string(),
            ));
        }

        // Keeps timestamp arithmetic in range.
        let max_duration = Duration::days(36_500);
        if [self.window, self.lockout_duration, self.retention_period]
            .iter()
            .any(|&duration| duration > max_duration)
        {
            return Err(ValidationError::InvalidConfig(
                "durations must not exceed 100 years".to_string(),
            ));
        }

        if self.retention_period < self.evaluation_horizon() {
            return Err(ValidationError::InvalidConfig(
                "retention_period must cover window + 2 * lockout_duration".to_string(),
            ));
        }

        Ok(())
    }

    /// Build a configuration from `BULWARK_*` environment variables.
    ///
    /// | Variable | Meaning | Default |
    /// |---|---|---|
    /// | `BULWARK_ENABLED` | `false`/`0` disables protection | `true` |
    /// | `BULWARK_CAPTCHA_THRESHOLD` | failures before CAPTCHA | 3 |
    /// | `BULWARK_LOCKOUT_THRESHOLD` | failures before lockout | 5 |
    /// | `BULWARK_WINDOW_SECS` | rolling window | 900 |
    /// | `BULWARK_LOCKOUT_SECS` | lockout duration | 900 |
    /// | `BULWARK_RETENTION_SECS` | record retention | 604800 |
    /// | `BULWARK_WARNING_THRESHOLD` | remaining-attempt warning | 5 |
    ///
    /// Unparseable values are rejected rather than silently replaced.
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ValidationError> {
        let defaults = Self::default();

        let parse_u32 = |key: &str, default: u32| -> Result<u32, ValidationError> {
            match lookup(key) {
                Some(value) => value.trim().parse().map_err(|_| {
                    ValidationError::InvalidConfig(format!("{key} is not a number: {value}"))
                }),
                None => Ok(default),
            }
        };

        let parse_secs = |key: &str, default: Duration| -> Result<Duration, ValidationError> {
            match lookup(key) {
                Some(value) => value
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(Duration::try_seconds)
                    .ok_or_else(|| {
                        ValidationError::InvalidConfig(format!(
                            "{key} is not a number of seconds in range: {value}"
                        ))
                    }),
                None => Ok(default),
            }
        };

        let enabled = match lookup("BULWARK_ENABLED") {
            Some(value) => !matches!(value.trim().to_lowercase().as_str(), "false" | "0" | "no"),
            None => defaults.enabled,
        };

        let config = Self {
            enabled,
            captcha_threshold: parse_u32("BULWARK_CAPTCHA_THRESHOLD", defaults.captcha_threshold)?,
            lockout_threshold: parse_u32("BULWARK_LOCKOUT_THRESHOLD", defaults.lockout_threshold)?,
            window: parse_secs("BULWARK_WINDOW_SECS", defaults.window)?,
            lockout_duration: parse_secs("BULWARK_LOCKOUT_SECS", defaults.lockout_duration)?,
            retention_period: parse_secs("BULWARK_RETENTION_SECS", defaults.retention_period)?,
            warning_threshold: parse_u32("BULWARK_WARNING_THRESHOLD", defaults.warning_threshold)?,
        };

        config.validate()?;
        Ok(config)
    }
}
