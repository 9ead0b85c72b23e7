//! Background worker for periodic and reconnect-driven synchronization.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use uuid::Uuid;

use issuerelay_events::{QueueEvent, Severity};

use crate::connectivity::ConnectivityState;
use crate::queue::IssueQueue;

/// Background sync worker.
///
/// Sweeps the queue on a fixed interval while online (the first tick fires
/// immediately, which covers the sync-on-startup pass) and on every
/// offline-to-online transition.
pub struct SyncWorker {
    queue: Arc<IssueQueue>,
    interval: Duration,
}

/// Handle to a started worker: request shutdown, await completion.
pub struct SyncWorkerHandle {
    shutdown: Arc<Notify>,
    join: tokio::task::JoinHandle<()>,
}

impl SyncWorkerHandle {
    /// Request graceful shutdown of the worker.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Request shutdown and wait for the worker task to finish.
    pub async fn shutdown_and_wait(self) {
        self.shutdown.notify_one();
        if let Err(err) = self.join.await {
            tracing::error!("sync worker task failed: {err}");
        }
    }
}

impl SyncWorker {
    pub fn new(queue: Arc<IssueQueue>, interval: Duration) -> Self {
        Self { queue, interval }
    }

    /// Start the background task.
    pub fn start(self) -> SyncWorkerHandle {
        let shutdown = Arc::new(Notify::new());
        let shutdown_rx = shutdown.clone();
        let queue = self.queue;
        let interval = self.interval;

        let join = tokio::spawn(async move {
            tracing::info!("issue sync worker started");

            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            let mut link = queue.connectivity().subscribe();

            loop {
                tokio::select! {
                    _ = shutdown_rx.notified() => {
                        tracing::info!("issue sync worker received shutdown signal");
                        break;
                    }
                    _ = ticks.tick() => {
                        if queue.connectivity().is_offline() {
                            tracing::debug!("skipping sweep - offline");
                            continue;
                        }
                        run_sweep(&queue, "interval").await;
                    }
                    changed = link.changed() => {
                        if changed.is_err() {
                            // Connectivity sender dropped with the queue.
                            break;
                        }
                        let state = *link.borrow_and_update();
                        if state == ConnectivityState::Online {
                            tracing::info!("connectivity restored; syncing queued issues");
                            run_sweep(&queue, "reconnect").await;
                            queue.publish(QueueEvent::status(
                                Severity::Success,
                                "Connected to network. Issues synced.",
                            ));
                        }
                    }
                }
            }

            tracing::info!("issue sync worker stopped");
        });

        SyncWorkerHandle { shutdown, join }
    }
}

async fn run_sweep(queue: &Arc<IssueQueue>, trigger: &str) {
    let sweep_id = Uuid::now_v7();
    tracing::debug!(%sweep_id, trigger, "starting submission sweep");
    queue.submit_pending_issues().await;
    tracing::debug!(%sweep_id, trigger, "submission sweep finished");
}
