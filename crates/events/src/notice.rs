//! User-facing queue event payloads.

use serde::Serialize;

/// Severity of a status notice, mirroring the status-bar levels a hosting UI
/// typically renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// Events published by the issue queue for presentation surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// Advisory status-bar notice.
    Status { severity: Severity, message: String },
    /// The pending-count badge may have changed.
    Badge { pending: usize },
    /// An offline-store sync pass uploaded `synced` issues.
    SyncCompleted { synced: usize },
    /// A sync or submission pass failed outright.
    SyncFailed { error: String },
}

impl QueueEvent {
    pub fn status(severity: Severity, message: impl Into<String>) -> Self {
        Self::Status {
            severity,
            message: message.into(),
        }
    }
}
