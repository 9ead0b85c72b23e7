//! Issue identifiers.
//!
//! Two id populations share one string type: locally minted ids (derived from
//! the creation time, short) and server-assigned ids (opaque, long). The two
//! are distinguished by length, which is what the sync path uses to decide
//! which records still need uploading.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Locally minted ids never exceed this length; server-assigned ids always do.
const LOCAL_ID_MAX_LEN: usize = 10;

/// Identifier of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Create an identifier from an externally supplied string.
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::invalid_id("IssueId cannot be empty"));
        }
        if id.chars().any(|c| c.is_control()) {
            return Err(DomainError::invalid_id(
                "IssueId contains control characters",
            ));
        }
        Ok(Self(id))
    }

    /// Mint a local id from the creation time.
    ///
    /// Seconds since the Unix epoch: 10 decimal digits, which keeps the id at
    /// or under [`LOCAL_ID_MAX_LEN`] so the server-assigned length heuristic
    /// stays sound.
    pub fn local_from_time(at: DateTime<Utc>) -> Self {
        Self(at.timestamp().max(0).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id was assigned by the server (length heuristic: anything
    /// longer than a local timestamp id).
    pub fn is_server_assigned(&self) -> bool {
        self.0.len() > LOCAL_ID_MAX_LEN
    }

    /// The next numeric id after this one, used to resolve same-second
    /// collisions when appending to the local store. `None` for non-numeric
    /// (server-assigned) ids.
    pub fn bumped(&self) -> Option<Self> {
        self.0
            .parse::<u64>()
            .ok()
            .map(|n| Self(n.saturating_add(1).to_string()))
    }
}

impl core::fmt::Display for IssueId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for IssueId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_ids_are_short() {
        let id = IssueId::local_from_time(Utc::now());
        assert!(id.as_str().len() <= LOCAL_ID_MAX_LEN);
        assert!(!id.is_server_assigned());
    }

    #[test]
    fn long_ids_are_server_assigned() {
        let id = IssueId::new("1722450000123").unwrap();
        assert_eq!(id.as_str().len(), 13);
        assert!(id.is_server_assigned());
    }

    #[test]
    fn short_external_ids_count_as_local() {
        let id = IssueId::new("abc123").unwrap();
        assert!(!id.is_server_assigned());
    }

    #[test]
    fn empty_ids_are_rejected() {
        assert!(IssueId::new("   ").is_err());
        assert!(IssueId::new("").is_err());
    }

    #[test]
    fn bumped_increments_numeric_ids() {
        let id = IssueId::new("1722450000").unwrap();
        assert_eq!(id.bumped().unwrap().as_str(), "1722450001");
        assert!(IssueId::new("not-numeric").unwrap().bumped().is_none());
    }
}
