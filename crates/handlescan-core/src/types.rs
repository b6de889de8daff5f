//! Shared types used across handlescan.
//!
//! This module defines common newtypes that provide type safety and clear
//! domain modeling.

use crate::error::HandleScanError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder that expands into one username per separator.
pub const VARIANT_PLACEHOLDER: &str = "{?}";

/// Separators substituted for [`VARIANT_PLACEHOLDER`].
const VARIANT_SEPARATORS: [&str; 3] = ["_", "-", "."];

/// Newtype for a username to probe.
///
/// Usernames must be non-empty and free of control characters. Whether a
/// username is acceptable to a particular site is decided per site, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Username(String);

impl Username {
    /// Create a new `Username` from a string.
    ///
    /// # Errors
    /// Returns error if the username is blank or contains control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, HandleScanError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the username carries the `{?}` variant placeholder.
    #[must_use]
    pub fn has_variants(&self) -> bool {
        self.0.contains(VARIANT_PLACEHOLDER)
    }

    fn validate(name: &str) -> Result<(), HandleScanError> {
        if name.trim().is_empty() {
            return Err(HandleScanError::Validation(
                "username cannot be empty".to_string(),
            ));
        }

        if name.chars().any(char::is_control) {
            return Err(HandleScanError::Validation(format!(
                "username contains control characters: {name:?}"
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Username {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Expand a username containing `{?}` into its separator variants.
///
/// `"john{?}doe"` becomes `john_doe`, `john-doe` and `john.doe`. A username
/// without the placeholder is returned unchanged as the only element.
#[must_use]
pub fn expand_username_variants(username: &Username) -> Vec<Username> {
    if !username.has_variants() {
        return vec![username.clone()];
    }

    VARIANT_SEPARATORS
        .iter()
        .map(|sep| Username(username.0.replace(VARIANT_PLACEHOLDER, sep)))
        .collect()
}

/// Unique identifier for one probe session (UUID v4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a new random `SessionId`.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_valid() {
        let name = Username::new("octocat").expect("valid username");
        assert_eq!(name.as_str(), "octocat");
        assert_eq!(name.to_string(), "octocat");
    }

    #[test]
    fn test_username_rejects_blank() {
        assert!(Username::new("").is_err());
        assert!(Username::new("   ").is_err());
    }

    #[test]
    fn test_username_rejects_control_chars() {
        assert!(Username::new("oct\ncat").is_err());
        assert!(Username::new("oct\u{7}cat").is_err());
    }

    #[test]
    fn test_username_allows_site_specific_shapes() {
        // Legality per site is decided by the site's own pattern.
        assert!(Username::new("john.doe").is_ok());
        assert!(Username::new("john doe").is_ok());
    }

    #[test]
    fn test_expand_variants() {
        let name = Username::new("john{?}doe").expect("valid username");
        let variants: Vec<String> = expand_username_variants(&name)
            .iter()
            .map(ToString::to_string)
            .collect();

        assert_eq!(variants, vec!["john_doe", "john-doe", "john.doe"]);
    }

    #[test]
    fn test_expand_without_placeholder() {
        let name = Username::new("johndoe").expect("valid username");
        let variants = expand_username_variants(&name);
        assert_eq!(variants, vec![name]);
    }

    #[test]
    fn test_session_id_generate_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }
}
