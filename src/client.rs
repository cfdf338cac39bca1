//! Upstream Client
//!
//! Typed accessors over the orchestration service (directly, or through the
//! gateway's `/proxy` prefix).
//!
//! Failure contract:
//! - Reads (`latest_runs`, `pending_approvals`) never raise. Any non-2xx
//!   status, transport failure or malformed body degrades to an empty list.
//! - `submit_task` raises on any failure so callers can clear their loading state.
//! - `approve_step` is fire-and-forget: the response status is logged, not returned.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ConsoleError, ConsoleResult};
use crate::types::{ApprovalReceipt, PendingApproval, RunResponse, TaskPayload};

/// The four operations the sync workflow depends on
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn submit_task(&self, payload: &TaskPayload) -> ConsoleResult<RunResponse>;

    /// Most recent run first
    async fn latest_runs(&self) -> Vec<RunResponse>;

    async fn pending_approvals(&self) -> Vec<PendingApproval>;

    async fn approve_step(&self, step_id: &str);
}

/// HTTP client for the orchestration service
#[derive(Clone)]
pub struct UpstreamClient {
    base_url: String,
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/approvals/{step_id}:approve` with the step id escaped as a
    /// single path segment
    fn approve_url(&self, step_id: &str) -> ConsoleResult<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConsoleError::InvalidConfig(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ConsoleError::InvalidConfig(format!("not a base URL: {}", self.base_url)))?
            .pop_if_empty()
            .push("approvals")
            .push(&format!("{}:approve", step_id));
        Ok(url)
    }

    /// GET a JSON list, degrading every failure to an empty list
    async fn read_list<T: DeserializeOwned>(&self, path: &str) -> Vec<T> {
        let resp = match self.client.get(self.url(path)).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("GET {} failed: {}", path, e);
                return Vec::new();
            }
        };

        if !resp.status().is_success() {
            warn!("GET {} returned {}", path, resp.status());
            return Vec::new();
        }

        match resp.json::<Vec<T>>().await {
            Ok(items) => {
                debug!("GET {} -> {} items", path, items.len());
                items
            }
            Err(e) => {
                warn!("GET {} returned an unreadable body: {}", path, e);
                Vec::new()
            }
        }
    }

    /// Approve a step and return the upstream's receipt.
    ///
    /// Unlike [`Upstream::approve_step`] this surfaces a rejected approval
    /// (e.g. `404` for an unknown step) as an error.
    pub async fn approve_step_checked(&self, step_id: &str) -> ConsoleResult<ApprovalReceipt> {
        let resp = self.client.post(self.approve_url(step_id)?).send().await?;

        if !resp.status().is_success() {
            return Err(ConsoleError::ApprovalRejected(resp.status()));
        }

        Ok(resp.json().await?)
    }

    /// Whether the upstream answers `GET /healthz` with a 2xx within `timeout`
    pub async fn healthz(&self, timeout: Duration) -> bool {
        match self
            .client
            .get(self.url("/healthz"))
            .timeout(timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Upstream health check failed: {}", e);
                false
            }
        }
    }

    /// Aggregate LLM usage counters, empty when unavailable
    pub async fn llm_usage_summary(&self) -> HashMap<String, f64> {
        let resp = match self.client.get(self.url("/metrics/llm/summary")).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("GET /metrics/llm/summary returned {}", resp.status());
                return HashMap::new();
            }
            Err(e) => {
                warn!("GET /metrics/llm/summary failed: {}", e);
                return HashMap::new();
            }
        };

        resp.json().await.unwrap_or_else(|e| {
            warn!("Unreadable LLM usage summary: {}", e);
            HashMap::new()
        })
    }

    /// Most recent LLM usage records, empty when unavailable
    pub async fn recent_llm_usage(&self, limit: usize) -> Vec<serde_json::Value> {
        self.read_list(&format!("/metrics/llm/recent?limit={}", limit))
            .await
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn submit_task(&self, payload: &TaskPayload) -> ConsoleResult<RunResponse> {
        let resp = self
            .client
            .post(self.url("/tasks"))
            .json(payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            warn!("Task submission rejected: {}", resp.status());
            return Err(ConsoleError::SubmissionFailed(resp.status()));
        }

        Ok(resp.json().await?)
    }

    async fn latest_runs(&self) -> Vec<RunResponse> {
        self.read_list("/runs/latest").await
    }

    async fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.read_list("/approvals/pending").await
    }

    async fn approve_step(&self, step_id: &str) {
        let url = match self.approve_url(step_id) {
            Ok(url) => url,
            Err(e) => {
                warn!("Approval of {} skipped: {}", step_id, e);
                return;
            }
        };

        // Status is only logged; `approve_step_checked` surfaces it.
        match self.client.post(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                debug!("Approved step {}", step_id);
            }
            Ok(resp) => warn!("Approval of {} returned {}", step_id, resp.status()),
            Err(e) => warn!("Approval of {} failed: {}", step_id, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;
    use httpmock::prelude::*;
    use reqwest::StatusCode;
    use serde_json::json;

    fn sample_run(id: &str, success_rate: f64) -> serde_json::Value {
        json!({
            "task": {"id": id, "title": "Deploy"},
            "plan": [
                {"id": "s1", "tool": "github", "instruction": "a", "needs_approval": false, "citations": []},
                {"id": "s2", "tool": "jira", "instruction": "b", "needs_approval": true, "citations": []},
                {"id": "s3", "tool": "none", "instruction": "c", "needs_approval": false, "citations": []}
            ],
            "results": [],
            "metrics": {"success_rate": success_rate, "hallucination_rate": 0.1,
                        "p95_latency_ms": 250.0, "total_cost_usd": 0.01}
        })
    }

    fn payload() -> TaskPayload {
        TaskPayload {
            title: "Deploy".to_string(),
            description: "Roll out".to_string(),
            risk_level: RiskLevel::Low,
            desired_outcome: "Live".to_string(),
        }
    }

    #[tokio::test]
    async fn test_latest_runs_with_mock_server() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/runs/latest");
                then.status(200).json_body(json!([sample_run("t1", 0.8)]));
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let runs = client.latest_runs().await;

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].task.id, "t1");
        assert_eq!(runs[0].plan.len(), 3);
        assert_eq!(runs[0].metrics.success_rate, 0.8);
    }

    #[tokio::test]
    async fn test_reads_degrade_to_empty_on_server_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/runs/latest");
                then.status(500).body("boom");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/approvals/pending");
                then.status(503);
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        assert!(client.latest_runs().await.is_empty());
        assert!(client.pending_approvals().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_degrade_to_empty_on_invalid_json() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/approvals/pending");
                then.status(200).body("not json");
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        assert!(client.pending_approvals().await.is_empty());
    }

    #[tokio::test]
    async fn test_reads_degrade_to_empty_on_connection_error() {
        let client = UpstreamClient::new("http://127.0.0.1:65534");
        assert!(client.latest_runs().await.is_empty());
        assert!(client.pending_approvals().await.is_empty());
        assert!(!client.healthz(Duration::from_secs(1)).await);
        assert!(client.llm_usage_summary().await.is_empty());
    }

    #[tokio::test]
    async fn test_submit_task_posts_payload() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/tasks")
                    .json_body(json!({
                        "title": "Deploy",
                        "description": "Roll out",
                        "risk_level": "low",
                        "desired_outcome": "Live"
                    }));
                then.status(200).json_body(sample_run("t9", 1.0));
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let run = client.submit_task(&payload()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(run.task.id, "t9");
    }

    #[tokio::test]
    async fn test_submit_task_raises_on_rejection() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/tasks");
                then.status(422).body("{\"detail\": \"bad\"}");
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let err = client.submit_task(&payload()).await.unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::SubmissionFailed(StatusCode::UNPROCESSABLE_ENTITY)
        ));
    }

    #[tokio::test]
    async fn test_submit_task_raises_on_connection_error() {
        let client = UpstreamClient::new("http://127.0.0.1:65534");
        let err = client.submit_task(&payload()).await.unwrap_err();
        assert!(matches!(err, ConsoleError::Transport(_)));
    }

    #[tokio::test]
    async fn test_approve_step_ignores_status() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/approvals/s1:approve");
                then.status(404).json_body(json!({"detail": "Approval not found"}));
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        client.approve_step("s1").await;
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_approve_step_checked_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/approvals/s1:approve");
                then.status(200).json_body(json!({
                    "step_id": "s1",
                    "status": "approved",
                    "updated_at": "2024-05-01T10:00:00.5"
                }));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/approvals/ghost:approve");
                then.status(404);
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let receipt = client.approve_step_checked("s1").await.unwrap();
        assert_eq!(receipt.status, "approved");

        let err = client.approve_step_checked("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::ApprovalRejected(StatusCode::NOT_FOUND)
        ));
    }

    #[tokio::test]
    async fn test_llm_usage_endpoints() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/metrics/llm/summary");
                then.status(200)
                    .json_body(json!({"total_calls": 12.0, "total_cost_usd": 0.42}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/metrics/llm/recent")
                    .query_param("limit", "2");
                then.status(200)
                    .json_body(json!([{"model": "stub"}, {"model": "stub"}]));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/healthz");
                then.status(200).json_body(json!({"status": "ok"}));
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let summary = client.llm_usage_summary().await;
        assert_eq!(summary.get("total_calls"), Some(&12.0));
        assert_eq!(client.recent_llm_usage(2).await.len(), 2);
        assert!(client.healthz(Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_healthz_gives_up_after_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/healthz");
                then.status(200).delay(Duration::from_secs(3));
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let started = std::time::Instant::now();
        assert!(!client.healthz(Duration::from_millis(200)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_pending_approvals_with_offset_timestamps() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/approvals/pending");
                then.status(200).json_body(json!([
                    {"step_id": "s1", "status": "pending",
                     "created_at": "2024-05-01T10:00:00Z",
                     "updated_at": "2024-05-01T10:00:00+00:00"},
                    {"step_id": "s2", "status": "pending",
                     "created_at": "2024-05-01T10:00:00.123456",
                     "updated_at": "not a date"}
                ]));
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let pending = client.pending_approvals().await;

        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].step_id, "s1");
        assert!(pending[0].created_at.is_some());
        assert_eq!(pending[0].created_at, pending[0].updated_at);
        assert!(pending[1].updated_at.is_none());
    }

    #[test]
    fn test_approve_url_escapes_step_id() {
        let client = UpstreamClient::new("http://upstream:8000/");
        assert_eq!(
            client.approve_url("s1").unwrap().as_str(),
            "http://upstream:8000/approvals/s1:approve"
        );
        assert_eq!(
            client.approve_url("a/b?c#d").unwrap().as_str(),
            "http://upstream:8000/approvals/a%2Fb%3Fc%23d:approve"
        );

        let proxied = UpstreamClient::new("http://127.0.0.1:3000/proxy");
        assert_eq!(
            proxied.approve_url("step 7").unwrap().as_str(),
            "http://127.0.0.1:3000/proxy/approvals/step%207:approve"
        );

        let broken = UpstreamClient::new("not a url");
        assert!(matches!(
            broken.approve_url("s1"),
            Err(ConsoleError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_step_sends_escaped_segment() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path_contains("/approvals/a")
                    .path_contains("b:approve");
                then.status(200).json_body(json!({
                    "step_id": "a/b",
                    "status": "approved",
                    "updated_at": "2024-05-01T10:00:00Z"
                }));
            })
            .await;

        let client = UpstreamClient::new(&server.base_url());
        let receipt = client.approve_step_checked("a/b").await.unwrap();
        assert_eq!(receipt.step_id, "a/b");
        assert!(receipt.updated_at.is_some());

        client.approve_step("a/b").await;
        mock.assert_hits_async(2).await;
    }
}
