//! `issuerelay-core` — issue domain foundation.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the `Issue` record, the status state machine, and domain errors.

pub mod error;
pub mod id;
pub mod issue;

pub use error::{DomainError, DomainResult};
pub use id::IssueId;
pub use issue::{Issue, IssueDraft, IssueStatus};
