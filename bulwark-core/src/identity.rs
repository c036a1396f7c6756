use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::ValidationError,
    validation::{normalize_email, validate_email},
};

/// The key that scopes an attempt history.
///
/// An identity key is always a trimmed, lowercased and syntactically valid
/// email address. IP address and user agent are deliberately not part of the
/// key; they are stored on each attempt for auditing only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Normalize and validate an email address into an identity key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bulwark_core::IdentityKey;
    ///
    /// let key = IdentityKey::parse("  Alice@Example.com ").unwrap();
    /// assert_eq!(key.as_str(), "alice@example.com");
    /// assert!(IdentityKey::parse("not-an-email").is_err());
    /// ```
    pub fn parse(email: &str) -> Result<Self, ValidationError> {
        let normalized = normalize_email(email);
        validate_email(&normalized)?;
        Ok(IdentityKey(normalized))
    }

    /// Wrap a value that is already normalized, e.g. one read back from storage.
    pub fn from_normalized(value: impl Into<String>) -> Self {
        IdentityKey(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let a = IdentityKey::parse("User@Example.com").unwrap();
        let b = IdentityKey::parse("  user@example.COM\t").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "user@example.com");
    }

    #[test]
    fn test_parse_rejects_malformed_email() {
        assert!(IdentityKey::parse("").is_err());
        assert!(IdentityKey::parse("   ").is_err());
        assert!(IdentityKey::parse("user@").is_err());
        assert!(IdentityKey::parse("user example.com").is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let key = IdentityKey::parse("user@example.com").unwrap();
        assert_eq!(
            serde_json::to_string(&key).unwrap(),
            "\"user@example.com\""
        );
    }
}
