use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a group member, typically an email address.
/// The ledger never interprets it beyond equality and ordering; validation
/// here only rejects identifiers that cannot name anyone at all.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemberId(String);

impl MemberId {
    /// Create a member identifier, trimming surrounding whitespace.
    /// Fails on empty or whitespace-only input.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidMemberId> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InvalidMemberId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidMemberId;

impl fmt::Display for InvalidMemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member identifier must not be empty")
    }
}

impl std::error::Error for InvalidMemberId {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_trims_whitespace() {
        let id = MemberId::new("  alice@example.com ").unwrap();
        assert_eq!(id.as_str(), "alice@example.com");
    }

    #[test]
    fn test_member_id_rejects_empty() {
        assert!(MemberId::new("").is_err());
        assert!(MemberId::new("   ").is_err());
    }

    #[test]
    fn test_member_id_orders_lexicographically() {
        let a = MemberId::new("alice").unwrap();
        let b = MemberId::new("bob").unwrap();
        assert!(a < b);
    }
}
