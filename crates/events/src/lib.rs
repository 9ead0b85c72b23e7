//! `issuerelay-events` — queue event distribution.
//!
//! A lightweight pub/sub bus carrying user-facing queue events (status-bar
//! notices, pending-count badge updates, sync outcomes) from the queue to
//! whatever presentation surface hosts it.

pub mod bus;
pub mod in_memory_bus;
pub mod notice;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::InMemoryEventBus;
pub use notice::{QueueEvent, Severity};
