//! Typed client for the remote issues API.
//!
//! Endpoints (consumed, not implemented here):
//! `GET/POST {base}/api/issues`, `PUT/DELETE {base}/api/issues/{id}`.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use issuerelay_core::{Issue, IssueDraft, IssueId, IssueStatus};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error ({0}): {1}")]
    Status(u16, String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// HTTP client for the issues API.
#[derive(Debug, Clone)]
pub struct IssuesApi {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    title: &'a str,
    description: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    status: IssueStatus,
}

#[derive(Debug, Serialize)]
struct UpdateBody {
    status: IssueStatus,
    retries: u32,
}

impl IssuesApi {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("failed to build HTTP client with timeout: {err}; using defaults");
                reqwest::Client::new()
            });

        Self { base_url, client }
    }

    fn collection_url(&self) -> String {
        format!("{}/api/issues", self.base_url.trim_end_matches('/'))
    }

    fn item_url(&self, id: &IssueId) -> String {
        format!("{}/{}", self.collection_url(), id)
    }

    /// `GET /api/issues`: fetch the full issue list.
    pub async fn list(&self) -> Result<Vec<Issue>, ApiError> {
        let resp = self
            .client
            .get(self.collection_url())
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    /// `POST /api/issues`: create from a draft (status starts pending).
    pub async fn create(&self, draft: &IssueDraft) -> Result<Issue, ApiError> {
        self.post_body(&CreateBody {
            title: &draft.title,
            description: &draft.description,
            kind: &draft.kind,
            status: IssueStatus::Pending,
        })
        .await
    }

    /// `POST /api/issues`: upload a locally queued record, preserving its
    /// status. The server assigns the id; the local one is not sent.
    pub async fn push_issue(&self, issue: &Issue) -> Result<Issue, ApiError> {
        self.post_body(&CreateBody {
            title: &issue.title,
            description: &issue.description,
            kind: &issue.kind,
            status: issue.status,
        })
        .await
    }

    async fn post_body(&self, body: &CreateBody<'_>) -> Result<Issue, ApiError> {
        let resp = self
            .client
            .post(self.collection_url())
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    /// `PUT /api/issues/{id}`: update status and retry count.
    pub async fn update(
        &self,
        id: &IssueId,
        status: IssueStatus,
        retries: u32,
    ) -> Result<Issue, ApiError> {
        let resp = self
            .client
            .put(self.item_url(id))
            .json(&UpdateBody { status, retries })
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        decode(resp).await
    }

    /// `DELETE /api/issues/{id}`.
    pub async fn delete(&self, id: &IssueId) -> Result<(), ApiError> {
        let resp = self
            .client
            .delete(self.item_url(id))
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(ApiError::Status(
                resp.status().as_u16(),
                resp.text().await.unwrap_or_default(),
            ));
        }
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    if !resp.status().is_success() {
        return Err(ApiError::Status(
            resp.status().as_u16(),
            resp.text().await.unwrap_or_default(),
        ));
    }
    resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))
}
