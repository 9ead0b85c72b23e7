//! Connectivity state reported by the host.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// The host reports a usable network link.
    Online,
    /// No link reported; network operations are doomed and skipped.
    Offline,
}

/// Host-reported link state with change notifications.
///
/// This is deliberately not a reachability test. It is a cheap gate that stops
/// doomed network calls, fed by whatever link signal the host has (network
/// manager events, a browser's online/offline events, a heartbeat). Reads are
/// synchronous; transitions fan out through a watch channel so the sync worker
/// can react to reconnects.
#[derive(Debug)]
pub struct Connectivity {
    tx: watch::Sender<ConnectivityState>,
}

impl Connectivity {
    pub fn new(initial: ConnectivityState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Current state (cheap, synchronous).
    pub fn probe(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.probe() == ConnectivityState::Online
    }

    pub fn is_offline(&self) -> bool {
        self.probe() == ConnectivityState::Offline
    }

    /// Mark the client as online. No-op (and no notification) if already online.
    pub fn set_online(&self) {
        self.set(ConnectivityState::Online);
    }

    /// Mark the client as offline. No-op (and no notification) if already offline.
    pub fn set_offline(&self) {
        self.set(ConnectivityState::Offline);
    }

    fn set(&self, next: ConnectivityState) {
        self.tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                tracing::info!("connectivity changed: {state:?} -> {next:?}");
                *state = next;
                true
            }
        });
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(ConnectivityState::Online)
    }
}
