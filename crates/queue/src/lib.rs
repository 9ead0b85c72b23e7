//! `issuerelay-queue`
//!
//! **Responsibility:** the offline-first issue queue.
//!
//! This crate provides:
//! - A durable local store for issues captured while offline
//! - Opportunistic synchronization with the remote issues API
//! - Handoff to an external tracker through a browser submission surface
//! - A background worker driving sweeps on an interval and on reconnect
//!
//! The queue is a **thin, best-effort client**: the remote API is the
//! authority while online, the local store while offline, and every failure
//! degrades to the local path instead of surfacing an error.

pub mod api;
pub mod config;
pub mod connectivity;
pub mod queue;
pub mod store;
pub mod tracker;
pub mod worker;

pub use api::{ApiError, IssuesApi};
pub use config::{ConfigError, QueueConfig, StoreLocation};
pub use connectivity::{Connectivity, ConnectivityState};
pub use queue::IssueQueue;
pub use store::{OFFLINE_ISSUES_KEY, OfflineStore};
pub use tracker::{SurfaceOpener, SystemOpener, TrackerHandoff};
pub use worker::{SyncWorker, SyncWorkerHandle};
