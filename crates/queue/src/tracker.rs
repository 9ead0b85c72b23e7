//! External tracker handoff.
//!
//! Final submission is human-in-the-loop: the queue opens a browser surface
//! pointed at the tracker's pre-filled new-issue form. Presenting the surface
//! counts as optimistic success; nothing confirms that the user completed the
//! submission.

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use issuerelay_core::Issue;

use crate::connectivity::Connectivity;

/// Presents a submission surface (a browser pointed at a pre-filled form).
///
/// Returns `true` only when the surface was actually presented; a blocked or
/// failed open is `false` so the issue stays queued for another attempt.
pub trait SurfaceOpener: Send + Sync {
    fn open(&self, url: &Url) -> bool;
}

/// Opens the platform browser via the OS opener command.
#[derive(Debug, Default)]
pub struct SystemOpener;

impl SurfaceOpener for SystemOpener {
    fn open(&self, url: &Url) -> bool {
        match spawn_opener(url) {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("failed to open browser surface for {url}: {err}");
                false
            }
        }
    }
}

#[cfg(target_os = "macos")]
fn spawn_opener(url: &Url) -> std::io::Result<std::process::Child> {
    std::process::Command::new("open").arg(url.as_str()).spawn()
}

#[cfg(target_os = "windows")]
fn spawn_opener(url: &Url) -> std::io::Result<std::process::Child> {
    std::process::Command::new("cmd")
        .args(["/C", "start", "", url.as_str()])
        .spawn()
}

#[cfg(all(unix, not(target_os = "macos")))]
fn spawn_opener(url: &Url) -> std::io::Result<std::process::Child> {
    std::process::Command::new("xdg-open")
        .arg(url.as_str())
        .spawn()
}

/// Handoff to the external tracker's new-issue form.
pub struct TrackerHandoff {
    base_url: String,
    client: reqwest::Client,
    opener: Arc<dyn SurfaceOpener>,
}

impl TrackerHandoff {
    pub fn new(base_url: String, probe_timeout: Duration, opener: Arc<dyn SurfaceOpener>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("failed to build probe client: {err}; using defaults");
                reqwest::Client::new()
            });

        Self {
            base_url,
            client,
            opener,
        }
    }

    /// Pre-filled new-issue URL for the tracker.
    ///
    /// `None` only when the configured tracker base cannot form a URL, which
    /// the caller treats as a failed attempt.
    pub fn new_issue_url(&self, issue: &Issue) -> Option<Url> {
        let base = format!("{}/issues/new", self.base_url.trim_end_matches('/'));
        let mut url = match Url::parse(&base) {
            Ok(url) => url,
            Err(err) => {
                tracing::error!("invalid tracker URL '{base}': {err}");
                return None;
            }
        };

        url.query_pairs_mut()
            .append_pair("title", &issue.title)
            .append_pair("body", &format_body(issue))
            .append_pair("labels", &issue.kind);

        Some(url)
    }

    /// Lightweight reachability probe against the tracker host. Any response
    /// counts; only transport failures (or the probe timeout) mean unreachable.
    pub async fn is_reachable(&self) -> bool {
        self.client.head(&self.base_url).send().await.is_ok()
    }

    /// Attempt the handoff for one issue.
    ///
    /// Re-checks connectivity, probes the tracker, then asks the opener to
    /// present the pre-filled form. `true` means a surface was presented.
    pub async fn submit(&self, connectivity: &Connectivity, issue: &Issue) -> bool {
        if connectivity.is_offline() {
            tracing::debug!("offline; not attempting tracker handoff for {}", issue.id);
            return false;
        }

        if !self.is_reachable().await {
            tracing::info!("tracker unreachable; issue {} stays queued", issue.id);
            return false;
        }

        let Some(url) = self.new_issue_url(issue) else {
            return false;
        };

        if !self.opener.open(&url) {
            tracing::info!("submission surface blocked for issue {}", issue.id);
            return false;
        }

        tracing::info!("opened tracker submission surface for issue {}", issue.id);
        true
    }
}

fn format_body(issue: &Issue) -> String {
    format!(
        "**Type:** {}\n**Reported:** {}\n\n{}\n\n*Filed automatically by the offline issue queue.*",
        issue.kind,
        issue.timestamp.to_rfc3339(),
        issue.description,
    )
}
