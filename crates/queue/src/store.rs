//! Durable offline store for the issue queue.
//!
//! The queue is persisted under a single namespace key as a JSON-serialized
//! list, read-modify-written as a whole. All mutations go through
//! [`OfflineStore::mutate`], which serializes the read-modify-write cycle
//! behind a mutex so interleaved async operations cannot clobber each other's
//! writes.

use std::path::PathBuf;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use issuerelay_core::{Issue, IssueId, IssueStatus};

use crate::config::StoreLocation;

/// Namespace key under which the offline queue is persisted.
pub const OFFLINE_ISSUES_KEY: &str = "offline_issues_temp";

/// SQLite-backed single-key store holding the offline issue queue.
#[derive(Debug)]
pub struct OfflineStore {
    pool: SqlitePool,
    /// Serializes read-modify-write cycles.
    write_gate: Mutex<()>,
}

impl OfflineStore {
    /// Open (and if necessary create) the store at the configured location.
    pub async fn open(location: &StoreLocation) -> anyhow::Result<Self> {
        let options = match location {
            StoreLocation::InMemory => SqliteConnectOptions::new().in_memory(true),
            StoreLocation::Path(path) => Self::file_options(path.clone())?,
            StoreLocation::Default => Self::file_options(default_db_path()?)?,
        };

        // A single connection keeps one consistent database even for the
        // in-memory location (each SQLite memory connection is its own db).
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("failed to open offline issue store")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create kv_store table")?;

        Ok(Self {
            pool,
            write_gate: Mutex::new(()),
        })
    }

    fn file_options(path: PathBuf) -> anyhow::Result<SqliteConnectOptions> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory at {parent:?}"))?;
        }
        Ok(SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true))
    }

    /// Load the queue. Missing or unreadable content degrades to an empty
    /// list; this store is a fallback path and must never fail the caller.
    pub async fn load(&self) -> Vec<Issue> {
        match self.read_raw().await {
            Ok(Some(raw)) => parse_issues(&raw),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::error!("failed to read offline issue store: {err:?}");
                Vec::new()
            }
        }
    }

    async fn read_raw(&self) -> anyhow::Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?1")
            .bind(OFFLINE_ISSUES_KEY)
            .fetch_optional(&self.pool)
            .await
            .context("failed to read offline issues")?;

        row.map(|r| r.try_get::<String, _>("value"))
            .transpose()
            .context("failed to decode offline issues row")
    }

    /// Read-modify-write the whole queue under the write gate and return the
    /// closure's output.
    pub async fn mutate<T>(&self, f: impl FnOnce(&mut Vec<Issue>) -> T) -> anyhow::Result<T> {
        let _guard = self.write_gate.lock().await;

        let mut issues = match self.read_raw().await? {
            Some(raw) => parse_issues(&raw),
            None => Vec::new(),
        };

        let out = f(&mut issues);

        let raw = serde_json::to_string(&issues).context("failed to encode offline issues")?;
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value)
            VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(OFFLINE_ISSUES_KEY)
        .bind(raw)
        .execute(&self.pool)
        .await
        .context("failed to write offline issues")?;

        Ok(out)
    }

    /// Append an issue, bumping a colliding local id to the next free value
    /// (ids stay unique within the queue).
    pub async fn append(&self, mut issue: Issue) -> anyhow::Result<Issue> {
        self.mutate(move |issues| {
            while issues.iter().any(|i| i.id == issue.id) {
                match issue.id.bumped() {
                    Some(next) => issue.id = next,
                    // Non-numeric ids cannot be bumped; the server owns those
                    // and re-appending one is a caller bug we tolerate.
                    None => break,
                }
            }
            issues.push(issue.clone());
            issue
        })
        .await
    }

    /// Update status/retries of the matching record in place.
    /// Returns the updated record, or `None` when the id is absent.
    pub async fn update_status(
        &self,
        id: &IssueId,
        status: IssueStatus,
        retries: u32,
    ) -> anyhow::Result<Option<Issue>> {
        self.mutate(|issues| {
            issues.iter_mut().find(|i| i.id == *id).map(|issue| {
                issue.apply_status(status, retries);
                issue.clone()
            })
        })
        .await
    }

    /// Remove the matching record. A missing id is a no-op.
    pub async fn remove(&self, id: &IssueId) -> anyhow::Result<()> {
        self.mutate(|issues| issues.retain(|i| i.id != *id)).await
    }

    /// Remove every record whose id is in `ids`.
    pub async fn remove_ids(&self, ids: &[IssueId]) -> anyhow::Result<()> {
        self.mutate(|issues| issues.retain(|i| !ids.contains(&i.id)))
            .await
    }
}

/// Resolve the default database path: `{app_data_dir}/issuerelay/queue.db`.
fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut path = base;
    path.push("issuerelay");
    path.push("queue.db");
    Ok(path)
}

fn parse_issues(raw: &str) -> Vec<Issue> {
    match serde_json::from_str(raw) {
        Ok(issues) => issues,
        Err(err) => {
            tracing::warn!("offline store payload is corrupt, treating as empty: {err}");
            Vec::new()
        }
    }
}
