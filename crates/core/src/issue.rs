//! The `Issue` record and its status lifecycle.
//!
//! Lifecycle:
//!
//! ```text
//! pending --successful handoff--> submitted            (terminal)
//! pending --failed handoff, retries <= 3--> pending    (retries incremented)
//! pending --failed handoff, retries  > 3--> failed
//! failed  --explicit user retry--> pending             (retries reset to 0)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::IssueId;

/// Failed handoff attempts tolerated before an issue is parked as `failed`.
pub const MAX_HANDOFF_RETRIES: u32 = 3;

/// Status of a queued issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    /// Not yet handed off to the external tracker.
    Pending,
    /// A submission surface was presented (not a confirmation it was filed).
    Submitted,
    /// Retry budget exhausted; recoverable only via explicit user retry.
    Failed,
}

impl IssueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Pending => "pending",
            IssueStatus::Submitted => "submitted",
            IssueStatus::Failed => "failed",
        }
    }

    /// Terminal states have no automatic outgoing transition; only `failed`
    /// can be revived, and only by an explicit user retry.
    pub fn is_terminal(&self) -> bool {
        matches!(self, IssueStatus::Submitted | IssueStatus::Failed)
    }
}

impl core::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-submitted problem report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    pub description: String,
    /// Categorical tag ("bug", "feature", ...); free-form, the fixed set is a
    /// presentation concern.
    #[serde(rename = "type")]
    pub kind: String,
    pub status: IssueStatus,
    /// Creation time (RFC 3339 on the wire).
    pub timestamp: DateTime<Utc>,
    /// Failed submission attempts so far.
    #[serde(default)]
    pub retries: u32,
}

impl Issue {
    pub fn is_pending(&self) -> bool {
        self.status == IssueStatus::Pending
    }

    /// Outcome of a failed tracker handoff: the retry counter increments, and
    /// the issue stays `pending` until the counter exceeds
    /// [`MAX_HANDOFF_RETRIES`].
    pub fn after_failed_handoff(&self) -> (IssueStatus, u32) {
        let retries = self.retries.saturating_add(1);
        if retries > MAX_HANDOFF_RETRIES {
            (IssueStatus::Failed, retries)
        } else {
            (IssueStatus::Pending, retries)
        }
    }

    /// Apply a status/retry update in place.
    pub fn apply_status(&mut self, status: IssueStatus, retries: u32) {
        self.status = status;
        self.retries = retries;
    }
}

/// Un-persisted form input for a new issue.
///
/// Validation happens at the presentation boundary via [`IssueDraft::validate`];
/// the queue itself accepts any draft and never rejects one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl IssueDraft {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            kind: kind.into(),
        }
    }

    /// Presentation-boundary validation: title and description are required.
    pub fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }
        if self.description.trim().is_empty() {
            return Err(DomainError::validation("description cannot be empty"));
        }
        Ok(())
    }

    /// Materialize the draft as a freshly-reported issue: always `pending`,
    /// zero retries.
    pub fn into_issue(self, id: IssueId, at: DateTime<Utc>) -> Issue {
        Issue {
            id,
            title: self.title,
            description: self.description,
            kind: self.kind,
            status: IssueStatus::Pending,
            timestamp: at,
            retries: 0,
        }
    }
}
