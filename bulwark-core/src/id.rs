//! Prefixed identifiers for attempt records
//!
//! Attempt ids look like `att_<random>` where the random part is 96 bits of
//! OS entropy encoded as URL-safe base64 without padding. Ids are assigned at
//! insert time so two writes landing in the same millisecond still produce two
//! distinct records.

use std::fmt;

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};
use serde::{Deserialize, Serialize};

/// Prefix used for attempt record ids.
pub const ATTEMPT_ID_PREFIX: &str = "att";

/// Generate a prefixed ID with at least 96 bits of entropy
///
/// The ID format is: `{prefix}_{random_string}`
///
/// # Example
/// ```
/// use bulwark_core::id::generate_prefixed_id;
///
/// let id = generate_prefixed_id("att");
/// assert!(id.starts_with("att_"));
/// ```
pub fn generate_prefixed_id(prefix: &str) -> String {
    let mut bytes = [0u8; 12];
    // The OS RNG only fails when the platform has no entropy source at all.
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("operating system entropy source unavailable");

    let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);

    format!("{prefix}_{encoded}")
}

/// Validate that a prefixed ID has the expected format
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    let Some(random_part) = id
        .strip_prefix(expected_prefix)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12,
        Err(_) => false,
    }
}

/// Identifier of a single stored login attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(String);

impl AttemptId {
    pub fn new(id: &str) -> Self {
        AttemptId(id.to_string())
    }

    pub fn new_random() -> Self {
        AttemptId(generate_prefixed_id(ATTEMPT_ID_PREFIX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new_random()
    }
}

impl From<String> for AttemptId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_prefixed_id() {
        let id = generate_prefixed_id("att");
        assert!(id.starts_with("att_"));
        assert!(id.len() > 4);

        let id2 = generate_prefixed_id("att");
        assert_ne!(id, id2);
    }

    #[test]
    fn test_validate_prefixed_id() {
        let id = generate_prefixed_id("att");
        assert!(validate_prefixed_id(&id, "att"));
        assert!(!validate_prefixed_id(&id, "usr"));

        assert!(!validate_prefixed_id("att", "att"));
        assert!(!validate_prefixed_id("att_", "att"));
        assert!(!validate_prefixed_id("att_invalid!", "att"));
    }

    #[test]
    fn test_attempt_id_random_is_valid() {
        let id = AttemptId::new_random();
        assert!(validate_prefixed_id(id.as_str(), ATTEMPT_ID_PREFIX));
        assert_ne!(id, AttemptId::new_random());
    }

    #[test]
    fn test_id_is_url_safe() {
        let id = AttemptId::new_random().into_inner();
        assert!(
            id.chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        );
    }
}
