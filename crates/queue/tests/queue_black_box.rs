//! Black-box tests: the queue driven against an in-process mock of the
//! remote issues API, bound to an ephemeral port.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use issuerelay_core::{Issue, IssueDraft, IssueId, IssueStatus};
use issuerelay_events::QueueEvent;
use issuerelay_queue::{IssueQueue, QueueConfig, StoreLocation, SurfaceOpener, SyncWorker};

// ---------------------------------------------------------------------------
// Mock issues API
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct MockApiState {
    issues: Arc<Mutex<Vec<Issue>>>,
    reject_titles: Arc<Mutex<HashSet<String>>>,
    next_id: Arc<Mutex<u64>>,
}

impl MockApiState {
    fn new() -> Self {
        Self {
            issues: Arc::new(Mutex::new(Vec::new())),
            reject_titles: Arc::new(Mutex::new(HashSet::new())),
            // Millisecond-epoch-shaped ids, 13 characters, like real servers
            // assign.
            next_id: Arc::new(Mutex::new(1_722_450_000_000)),
        }
    }

    fn reject_title(&self, title: &str) {
        self.reject_titles.lock().unwrap().insert(title.to_string());
    }

    fn snapshot(&self) -> Vec<Issue> {
        self.issues.lock().unwrap().clone()
    }
}

#[derive(serde::Deserialize)]
struct CreateBody {
    title: String,
    description: String,
    #[serde(rename = "type")]
    kind: String,
    status: IssueStatus,
}

#[derive(serde::Deserialize)]
struct UpdateBody {
    status: IssueStatus,
    retries: u32,
}

async fn list_issues(State(state): State<MockApiState>) -> Json<Vec<Issue>> {
    Json(state.snapshot())
}

async fn create_issue(
    State(state): State<MockApiState>,
    Json(body): Json<CreateBody>,
) -> Response {
    if state.reject_titles.lock().unwrap().contains(&body.title) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "rejected").into_response();
    }

    let id = {
        let mut next = state.next_id.lock().unwrap();
        let id = next.to_string();
        *next += 1;
        id
    };

    let issue = Issue {
        id: IssueId::new(id).unwrap(),
        title: body.title,
        description: body.description,
        kind: body.kind,
        status: body.status,
        timestamp: Utc::now(),
        retries: 0,
    };
    state.issues.lock().unwrap().push(issue.clone());

    (StatusCode::CREATED, Json(issue)).into_response()
}

async fn update_issue(
    State(state): State<MockApiState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Response {
    let mut issues = state.issues.lock().unwrap();
    match issues.iter_mut().find(|i| i.id.as_str() == id) {
        Some(issue) => {
            issue.apply_status(body.status, body.retries);
            Json(issue.clone()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "issue not found").into_response(),
    }
}

async fn delete_issue(State(state): State<MockApiState>, Path(id): Path<String>) -> Response {
    let mut issues = state.issues.lock().unwrap();
    let before = issues.len();
    issues.retain(|i| i.id.as_str() != id);
    if issues.len() == before {
        (StatusCode::NOT_FOUND, "issue not found").into_response()
    } else {
        Json(serde_json::json!({ "success": true })).into_response()
    }
}

struct TestApi {
    base_url: String,
    state: MockApiState,
    handle: tokio::task::JoinHandle<()>,
}

impl TestApi {
    async fn spawn() -> Self {
        let state = MockApiState::new();
        let app = Router::new()
            .route("/api/issues", get(list_issues).post(create_issue))
            .route(
                "/api/issues/:id",
                axum::routing::put(update_issue).delete(delete_issue),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            state,
            handle,
        }
    }
}

impl Drop for TestApi {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// An address nothing listens on (bind an ephemeral port, then drop it).
async fn dead_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

// ---------------------------------------------------------------------------
// Submission surface fakes
// ---------------------------------------------------------------------------

struct RecordingOpener {
    opened: Mutex<Vec<String>>,
    accept: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingOpener {
    fn accepting() -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
            accept: AtomicBool::new(true),
            delay: None,
        })
    }

    fn blocking() -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
            accept: AtomicBool::new(false),
            delay: None,
        })
    }

    fn slow_accepting(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
            accept: AtomicBool::new(true),
            delay: Some(delay),
        })
    }

    fn count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    fn urls(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl SurfaceOpener for RecordingOpener {
    fn open(&self, url: &url::Url) -> bool {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.opened.lock().unwrap().push(url.to_string());
        self.accept.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn draft() -> IssueDraft {
    IssueDraft::new("Leak", "Water under sink", "bug")
}

fn local_issue(id: &str, title: &str) -> Issue {
    IssueDraft::new(title, "Water under sink", "bug")
        .into_issue(IssueId::new(id).unwrap(), Utc::now())
}

async fn open_queue(api_base: &str, tracker_base: &str, opener: Arc<dyn SurfaceOpener>) -> IssueQueue {
    issuerelay_observability::init_with_default_filter("warn");
    let config = QueueConfig {
        api_base: api_base.to_string(),
        tracker_base: tracker_base.to_string(),
        store: StoreLocation::InMemory,
        request_timeout: Duration::from_secs(2),
        probe_timeout: Duration::from_secs(1),
        sweep_interval: Duration::from_secs(60),
    };
    IssueQueue::open(config, opener).await.expect("open queue")
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn offline_create_stores_pending_issue_with_local_id() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;
    queue.connectivity().set_offline();

    let issue = queue.create_issue(draft()).await;

    assert_eq!(issue.status, IssueStatus::Pending);
    assert_eq!(issue.retries, 0);
    assert!(!issue.id.is_server_assigned());
    assert!(issue.id.as_str().len() <= 10);

    let listed = queue.list_issues().await;
    assert_eq!(listed, vec![issue]);
    assert!(api.state.snapshot().is_empty());
}

#[tokio::test]
async fn online_create_returns_server_assigned_id() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;

    let issue = queue.create_issue(draft()).await;

    assert!(issue.id.is_server_assigned());
    assert!(issue.id.as_str().len() > 10);
    assert_eq!(issue.status, IssueStatus::Pending);
    assert_eq!(api.state.snapshot().len(), 1);
    assert!(queue.offline_store().load().await.is_empty());
}

#[tokio::test]
async fn create_falls_back_to_local_store_when_api_is_unreachable() {
    let dead = dead_endpoint().await;
    let queue = open_queue(&dead, &dead, RecordingOpener::accepting()).await;

    let issue = queue.create_issue(draft()).await;

    assert!(!issue.id.is_server_assigned());
    assert_eq!(issue.status, IssueStatus::Pending);
    assert_eq!(queue.offline_store().load().await, vec![issue]);
}

#[tokio::test]
async fn sync_uploads_only_locally_minted_ids() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;

    // Seed the store: one local id (6 chars), one server-shaped id (15 chars).
    let store = queue.offline_store();
    store.append(local_issue("abc123", "Local one")).await.unwrap();
    store
        .append(local_issue("172245000012345", "Already uploaded"))
        .await
        .unwrap();

    let synced = queue.sync_offline_issues().await;

    assert_eq!(synced, 1);
    let server = api.state.snapshot();
    assert_eq!(server.len(), 1);
    assert_eq!(server[0].title, "Local one");

    // Only the synced record left the store.
    let remaining = store.load().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Already uploaded");
}

#[tokio::test]
async fn partial_sync_failure_keeps_unsynced_issues_queued() {
    let api = TestApi::spawn().await;
    api.state.reject_title("Bad one");
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;

    let store = queue.offline_store();
    store.append(local_issue("1722450000", "Good one")).await.unwrap();
    store.append(local_issue("1722460000", "Bad one")).await.unwrap();

    let synced = queue.sync_offline_issues().await;

    assert_eq!(synced, 1);
    assert_eq!(api.state.snapshot().len(), 1);

    let remaining = store.load().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "Bad one");
}

#[tokio::test]
async fn sync_while_offline_is_a_no_op() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;
    queue.connectivity().set_offline();

    queue.offline_store().append(local_issue("1722450000", "Queued")).await.unwrap();

    assert_eq!(queue.sync_offline_issues().await, 0);
    assert!(api.state.snapshot().is_empty());
    assert_eq!(queue.offline_store().load().await.len(), 1);
}

#[tokio::test]
async fn delete_is_idempotent_for_unknown_ids() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;
    queue.connectivity().set_offline();

    let created = queue.create_issue(draft()).await;
    let phantom = IssueId::new("abc123").unwrap();

    // Deleting an absent id completes and leaves the queue unchanged.
    queue.delete_issue(&phantom).await;
    assert_eq!(queue.list_issues().await.len(), 1);

    // Deleting twice is fine; the queue ends without the id.
    queue.delete_issue(&created.id).await;
    queue.delete_issue(&created.id).await;
    assert!(queue.list_issues().await.is_empty());
}

#[tokio::test]
async fn round_trip_create_update_list() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;

    let issue = queue.create_issue(IssueDraft::new("T", "D", "bug")).await;
    let updated = queue
        .update_status(&issue.id, IssueStatus::Submitted, 0)
        .await
        .expect("issue exists");
    assert_eq!(updated.status, IssueStatus::Submitted);

    let listed = queue.list_issues().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, IssueStatus::Submitted);
}

#[tokio::test]
async fn update_status_returns_none_for_unknown_id() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;

    let phantom = IssueId::new("abc123").unwrap();
    let updated = queue.update_status(&phantom, IssueStatus::Failed, 4).await;
    assert!(updated.is_none());
}

#[tokio::test]
async fn blocked_surface_increments_retries_until_failed() {
    let api = TestApi::spawn().await;
    let opener = RecordingOpener::blocking();
    let queue = open_queue(&api.base_url, &api.base_url, opener.clone()).await;

    let issue = queue.create_issue(draft()).await;

    // Three blocked attempts: still pending, retries 1..=3.
    for expected in 1..=3u32 {
        queue.submit_pending_issues().await;
        let listed = queue.list_issues().await;
        let current = &listed[0];
        assert_eq!(current.status, IssueStatus::Pending);
        assert_eq!(current.retries, expected);
    }

    // Fourth blocked attempt crosses the threshold.
    queue.submit_pending_issues().await;
    let listed = queue.list_issues().await;
    let current = &listed[0];
    assert_eq!(current.status, IssueStatus::Failed);
    assert_eq!(current.retries, 4);
    assert_eq!(opener.count(), 4);

    // Failed issues are not retried automatically.
    queue.submit_pending_issues().await;
    assert_eq!(opener.count(), 4);

    // Explicit user retry revives it with a fresh budget.
    queue.retry_issue(&issue.id).await;
    let listed = queue.list_issues().await;
    let current = &listed[0];
    assert_eq!(current.retries, 1); // one more blocked attempt ran immediately
    assert_eq!(current.status, IssueStatus::Pending);
}

#[tokio::test]
async fn issue_at_retry_limit_fails_on_next_blocked_attempt() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::blocking()).await;

    let issue = queue.create_issue(draft()).await;
    queue.update_status(&issue.id, IssueStatus::Pending, 3).await;

    queue.submit_pending_issues().await;

    let listed = queue.list_issues().await;
    let current = &listed[0];
    assert_eq!(current.status, IssueStatus::Failed);
    assert_eq!(current.retries, 4);
}

#[tokio::test]
async fn presented_surface_marks_issue_submitted() {
    let api = TestApi::spawn().await;
    let opener = RecordingOpener::accepting();
    let queue = open_queue(&api.base_url, &api.base_url, opener.clone()).await;

    queue.create_issue(draft()).await;
    queue.submit_pending_issues().await;

    let listed = queue.list_issues().await;
    assert_eq!(listed[0].status, IssueStatus::Submitted);
    assert_eq!(listed[0].retries, 0);

    let urls = opener.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("/issues/new?"));
    assert!(urls[0].contains("title=Leak"));
    assert!(urls[0].contains("labels=bug"));
}

#[tokio::test]
async fn unreachable_tracker_counts_as_failed_attempt_without_opening() {
    let api = TestApi::spawn().await;
    let dead = dead_endpoint().await;
    let opener = RecordingOpener::accepting();
    let queue = open_queue(&api.base_url, &dead, opener.clone()).await;

    queue.create_issue(draft()).await;
    queue.submit_pending_issues().await;

    assert_eq!(opener.count(), 0);
    let listed = queue.list_issues().await;
    let current = &listed[0];
    assert_eq!(current.status, IssueStatus::Pending);
    assert_eq!(current.retries, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_sweeps_open_one_surface_per_issue() {
    let api = TestApi::spawn().await;
    let opener = RecordingOpener::slow_accepting(Duration::from_millis(150));
    let queue = Arc::new(open_queue(&api.base_url, &api.base_url, opener.clone()).await);

    queue.create_issue(draft()).await;

    tokio::join!(queue.submit_pending_issues(), queue.submit_pending_issues());

    assert_eq!(opener.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn worker_sweeps_on_reconnect() {
    let api = TestApi::spawn().await;
    let opener = RecordingOpener::accepting();
    let queue = Arc::new(open_queue(&api.base_url, &api.base_url, opener.clone()).await);
    queue.connectivity().set_offline();

    queue.create_issue(draft()).await;
    assert_eq!(queue.offline_store().load().await.len(), 1);

    let handle = SyncWorker::new(queue.clone(), Duration::from_secs(60)).start();

    queue.connectivity().set_online();

    // The reconnect sweep uploads the queued issue and hands it off.
    let mut done = false;
    for _ in 0..200 {
        let server = api.state.snapshot();
        if server.len() == 1 && server[0].status == IssueStatus::Submitted {
            done = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(done, "queued issue did not reach submitted via the worker");
    assert!(queue.offline_store().load().await.is_empty());
    assert_eq!(opener.count(), 1);

    handle.shutdown_and_wait().await;
}

#[tokio::test]
async fn queue_events_cover_notices_and_badge() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;
    queue.connectivity().set_offline();

    let events = queue.subscribe();
    queue.create_issue(draft()).await;

    let received = events.drain();
    assert!(
        received
            .iter()
            .any(|e| matches!(e, QueueEvent::Status { .. })),
        "expected a status notice, got {received:?}"
    );
    assert!(
        received
            .iter()
            .any(|e| matches!(e, QueueEvent::Badge { pending: 1 })),
        "expected a badge update, got {received:?}"
    );
}

#[tokio::test]
async fn sync_completion_publishes_count() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;

    queue.offline_store().append(local_issue("1722450000", "Queued")).await.unwrap();

    let events = queue.subscribe();
    let synced = queue.sync_offline_issues().await;
    assert_eq!(synced, 1);

    let received = events.drain();
    assert!(
        received
            .iter()
            .any(|e| matches!(e, QueueEvent::SyncCompleted { synced: 1 })),
        "expected a sync completion event, got {received:?}"
    );
}

#[tokio::test]
async fn pending_count_tracks_status_changes() {
    let api = TestApi::spawn().await;
    let queue = open_queue(&api.base_url, &api.base_url, RecordingOpener::accepting()).await;

    let a = queue.create_issue(IssueDraft::new("A", "first", "bug")).await;
    queue.create_issue(IssueDraft::new("B", "second", "bug")).await;
    assert_eq!(queue.pending_count().await, 2);

    queue.update_status(&a.id, IssueStatus::Submitted, 0).await;
    assert_eq!(queue.pending_count().await, 1);
}
