//! Approval Key
//!
//! The bearer credential required to open and subscribe to the execution
//! feed. No issue timestamp is tracked locally: freshness is enforced by the
//! cache TTL, which is deliberately shorter than the credential's validity.

use std::fmt;
use std::time::Duration;

/// How long the remote server honours an approval key.
pub const APPROVAL_KEY_VALIDITY: Duration = Duration::from_secs(24 * 60 * 60);

/// How long an approval key is kept in the cache (23 hours).
///
/// Must stay below [`APPROVAL_KEY_VALIDITY`] so the cache always expires
/// before the credential does.
pub const APPROVAL_KEY_CACHE_TTL: Duration = Duration::from_secs(82_800);

/// An opaque approval key. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApprovalKey(String);

impl ApprovalKey {
    /// Accept a raw value if it is usable: present and not blank.
    ///
    /// Surrounding whitespace is trimmed. Blank values are `None`, never a
    /// key that is "present but invalid".
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Get the raw key for putting on the wire.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApprovalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApprovalKey").field(&"[REDACTED]").finish()
    }
}

impl fmt::Display for ApprovalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}
