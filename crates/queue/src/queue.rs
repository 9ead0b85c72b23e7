//! The offline-first issue queue.
//!
//! Every operation is best-effort: while offline the local store is the
//! authority, while online the remote API is, and any API failure falls back
//! to the equivalent local mutation. Nothing here returns a hard error to the
//! caller after construction; degraded paths surface only as advisory events.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;

use issuerelay_core::{Issue, IssueDraft, IssueId, IssueStatus};
use issuerelay_events::{EventBus, InMemoryEventBus, QueueEvent, Severity, Subscription};

use crate::api::IssuesApi;
use crate::config::QueueConfig;
use crate::connectivity::Connectivity;
use crate::store::OfflineStore;
use crate::tracker::{SurfaceOpener, TrackerHandoff};

/// Offline-first queue of user-reported issues.
///
/// Owns the local store, the API client, the connectivity gate, and the
/// tracker handoff; publishes advisory [`QueueEvent`]s for whatever
/// presentation surface hosts it.
pub struct IssueQueue {
    store: OfflineStore,
    api: IssuesApi,
    connectivity: Arc<Connectivity>,
    tracker: TrackerHandoff,
    events: Arc<InMemoryEventBus<QueueEvent>>,
    /// At most one submission sweep runs at a time; a second trigger skips.
    sweep_gate: Mutex<()>,
}

impl IssueQueue {
    /// Open the queue with the given configuration and submission surface.
    pub async fn open(config: QueueConfig, opener: Arc<dyn SurfaceOpener>) -> anyhow::Result<Self> {
        config.validate()?;

        let store = OfflineStore::open(&config.store).await?;
        let api = IssuesApi::new(config.api_base.clone(), config.request_timeout);
        let tracker = TrackerHandoff::new(config.tracker_base.clone(), config.probe_timeout, opener);

        Ok(Self {
            store,
            api,
            connectivity: Arc::new(Connectivity::default()),
            tracker,
            events: Arc::new(InMemoryEventBus::new()),
            sweep_gate: Mutex::new(()),
        })
    }

    /// The connectivity gate; hosts feed link transitions into it.
    pub fn connectivity(&self) -> &Arc<Connectivity> {
        &self.connectivity
    }

    /// Subscribe to advisory queue events (notices, badge updates, sync outcomes).
    pub fn subscribe(&self) -> Subscription<QueueEvent> {
        self.events.subscribe()
    }

    /// Direct access to the offline store (maintenance surfaces, tests).
    pub fn offline_store(&self) -> &OfflineStore {
        &self.store
    }

    /// Best-effort issue listing.
    ///
    /// Offline: local store contents. Online: the API's list, falling back to
    /// the local store on any failure. Never fails the caller.
    pub async fn list_issues(&self) -> Vec<Issue> {
        if self.connectivity.is_offline() {
            return self.store.load().await;
        }

        match self.api.list().await {
            Ok(issues) => issues,
            Err(err) => {
                tracing::warn!("listing issues via API failed, using local store: {err}");
                self.notify(
                    Severity::Warning,
                    "Could not reach the issues API; showing locally stored issues",
                );
                self.store.load().await
            }
        }
    }

    /// Create an issue from a draft. Always succeeds from the caller's view:
    /// the online path returns the server's record (server-assigned id), every
    /// other path returns the locally stored record (timestamp id).
    pub async fn create_issue(&self, draft: IssueDraft) -> Issue {
        let now = Utc::now();

        if self.connectivity.is_offline() {
            let issue = self
                .store_locally(draft.into_issue(IssueId::local_from_time(now), now))
                .await;
            self.notify(
                Severity::Info,
                "Issue saved locally. It will sync when online.",
            );
            self.publish_badge().await;
            return issue;
        }

        match self.api.create(&draft).await {
            Ok(issue) => {
                tracing::info!("issue {} created on server", issue.id);
                self.publish_badge().await;
                issue
            }
            Err(err) => {
                tracing::warn!("creating issue on server failed, storing locally: {err}");
                let issue = self
                    .store_locally(draft.into_issue(IssueId::local_from_time(now), now))
                    .await;
                self.notify(
                    Severity::Warning,
                    "Failed to save issue to the server; stored locally",
                );
                self.publish_badge().await;
                issue
            }
        }
    }

    async fn store_locally(&self, issue: Issue) -> Issue {
        match self.store.append(issue.clone()).await {
            Ok(stored) => stored,
            Err(err) => {
                // The caller still gets a created record; it just did not
                // survive to durable storage.
                tracing::error!("failed to persist issue locally: {err:?}");
                issue
            }
        }
    }

    /// Update an issue's status and retry count.
    ///
    /// Returns the updated record, or `None` when no record matches. API
    /// failures fall back to the local mutation.
    pub async fn update_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
        retries: u32,
    ) -> Option<Issue> {
        if self.connectivity.is_offline() {
            return self.local_update(id, status, retries).await;
        }

        match self.api.update(id, status, retries).await {
            Ok(issue) => Some(issue),
            Err(err) => {
                tracing::warn!("updating issue {id} via API failed, mutating locally: {err}");
                self.local_update(id, status, retries).await
            }
        }
    }

    async fn local_update(
        &self,
        id: &IssueId,
        status: IssueStatus,
        retries: u32,
    ) -> Option<Issue> {
        match self.store.update_status(id, status, retries).await {
            Ok(updated) => updated,
            Err(err) => {
                tracing::error!("failed to update issue {id} locally: {err:?}");
                None
            }
        }
    }

    /// Delete an issue. Idempotent and infallible from the caller's view;
    /// API failures fall back to local removal.
    pub async fn delete_issue(&self, id: &IssueId) {
        if self.connectivity.is_offline() {
            self.local_remove(id).await;
        } else if let Err(err) = self.api.delete(id).await {
            tracing::warn!("deleting issue {id} via API failed, removing locally: {err}");
            self.notify(
                Severity::Warning,
                "Could not delete the issue on the server; removed locally",
            );
            self.local_remove(id).await;
        }

        self.publish_badge().await;
    }

    async fn local_remove(&self, id: &IssueId) {
        if let Err(err) = self.store.remove(id).await {
            tracing::error!("failed to remove issue {id} locally: {err:?}");
        }
    }

    /// Upload locally queued issues to the API.
    ///
    /// Skips records that already carry a server-assigned id. Only the issues
    /// the server acknowledged are removed from the store; failed uploads stay
    /// queued for the next pass. Returns the number synced.
    pub async fn sync_offline_issues(&self) -> usize {
        if self.connectivity.is_offline() {
            return 0;
        }

        let queued = self.store.load().await;
        if queued.is_empty() {
            return 0;
        }

        let mut synced: Vec<IssueId> = Vec::new();
        for issue in &queued {
            if issue.id.is_server_assigned() {
                continue;
            }
            match self.api.push_issue(issue).await {
                Ok(created) => {
                    tracing::info!("uploaded queued issue {} as {}", issue.id, created.id);
                    synced.push(issue.id.clone());
                }
                Err(err) => {
                    tracing::warn!("uploading queued issue {} failed: {err}", issue.id);
                }
            }
        }

        if synced.is_empty() {
            return 0;
        }

        if let Err(err) = self.store.remove_ids(&synced).await {
            tracing::error!("failed to drop synced issues from the store: {err:?}");
        }

        let count = synced.len();
        self.publish(QueueEvent::SyncCompleted { synced: count });
        self.notify(
            Severity::Success,
            format!("Synced {count} offline issue(s) to the server"),
        );
        self.publish_badge().await;
        count
    }

    /// Sweep pending issues through the tracker handoff.
    ///
    /// Returns immediately when offline or when another sweep is in flight
    /// (no duplicate submission surfaces). Aborts mid-loop if connectivity
    /// drops; the remaining issues wait for the next sweep.
    pub async fn submit_pending_issues(&self) {
        if self.connectivity.is_offline() {
            tracing::debug!("offline; skipping submission sweep");
            return;
        }

        let Ok(_guard) = self.sweep_gate.try_lock() else {
            tracing::debug!("a submission sweep is already running; skipping");
            return;
        };

        self.sync_offline_issues().await;

        let pending: Vec<Issue> = self
            .list_issues()
            .await
            .into_iter()
            .filter(Issue::is_pending)
            .collect();

        if pending.is_empty() {
            return;
        }

        tracing::info!("submitting {} pending issue(s)", pending.len());

        for issue in pending {
            if self.connectivity.is_offline() {
                tracing::info!("connectivity lost mid-sweep; stopping");
                break;
            }

            if self.tracker.submit(&self.connectivity, &issue).await {
                self.update_status(&issue.id, IssueStatus::Submitted, 0).await;
            } else {
                let (status, retries) = issue.after_failed_handoff();
                if status == IssueStatus::Failed {
                    self.notify(
                        Severity::Error,
                        format!(
                            "Issue \"{}\" exhausted its submission attempts; retry it manually",
                            issue.title
                        ),
                    );
                }
                self.update_status(&issue.id, status, retries).await;
            }
        }

        self.publish_badge().await;
    }

    /// Explicit user retry of a failed (or stuck) issue: back to pending with
    /// a fresh retry budget, then an immediate sweep if online.
    pub async fn retry_issue(&self, id: &IssueId) {
        self.update_status(id, IssueStatus::Pending, 0).await;

        if self.connectivity.is_online() {
            self.submit_pending_issues().await;
        } else {
            self.publish_badge().await;
        }
    }

    /// Number of pending issues (badge value).
    pub async fn pending_count(&self) -> usize {
        self.list_issues()
            .await
            .iter()
            .filter(|issue| issue.is_pending())
            .count()
    }

    pub(crate) fn notify(&self, severity: Severity, message: impl Into<String>) {
        self.publish(QueueEvent::status(severity, message));
    }

    pub(crate) fn publish(&self, event: QueueEvent) {
        if let Err(err) = self.events.publish(event) {
            tracing::warn!("failed to publish queue event: {err:?}");
        }
    }

    async fn publish_badge(&self) {
        let pending = self.pending_count().await;
        self.publish(QueueEvent::Badge { pending });
    }
}
