//! In-memory upstream that records the order of calls.

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::StatusCode;
use std::collections::VecDeque;
use tokio::sync::oneshot;

use crate::client::Upstream;
use crate::error::{ConsoleError, ConsoleResult};
use crate::types::{Metrics, PendingApproval, PlanStep, RunResponse, TaskPayload, TaskRef};

pub(crate) fn sample_run(id: &str, title: &str, success_rate: f64) -> RunResponse {
    RunResponse {
        task: TaskRef {
            id: id.to_string(),
            title: title.to_string(),
        },
        plan: (1..=3)
            .map(|i| PlanStep {
                id: format!("{}-s{}", id, i),
                tool: "none".to_string(),
                instruction: format!("step {}", i),
                needs_approval: i == 2,
                citations: Vec::new(),
            })
            .collect(),
        results: Vec::new(),
        metrics: Metrics {
            success_rate,
            hallucination_rate: 0.0,
            p95_latency_ms: 100.0,
            total_cost_usd: 0.0,
        },
    }
}

#[derive(Default)]
pub(crate) struct FakeUpstream {
    calls: Mutex<Vec<String>>,
    runs: Mutex<Vec<RunResponse>>,
    pending: Mutex<Vec<PendingApproval>>,
    reject: Mutex<Option<StatusCode>>,
    gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
}

impl FakeUpstream {
    pub(crate) fn with_pending(step_ids: &[&str]) -> Self {
        let fake = Self::default();
        *fake.pending.lock() = step_ids
            .iter()
            .map(|id| PendingApproval {
                step_id: id.to_string(),
                status: "pending".to_string(),
                created_at: None,
                updated_at: None,
            })
            .collect();
        fake
    }

    /// Newest first, like the upstream
    pub(crate) fn push_run(&self, run: RunResponse) {
        self.runs.lock().insert(0, run);
    }

    pub(crate) fn clear_runs(&self) {
        self.runs.lock().clear();
    }

    pub(crate) fn reject_submissions(&self, status: StatusCode) {
        *self.reject.lock() = Some(status);
    }

    /// Park the next unheld submission until the returned sender fires.
    /// Holds are consumed in submission order.
    pub(crate) fn hold_submissions(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().push_back(rx);
        tx
    }

    pub(crate) fn log(&self, entry: String) {
        self.calls.lock().push(entry);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn submit_task(&self, payload: &TaskPayload) -> ConsoleResult<RunResponse> {
        self.log(format!("submit:{}", payload.title));

        let gate = self.gates.lock().pop_front();
        if let Some(rx) = gate {
            let _ = rx.await;
        }

        if let Some(status) = *self.reject.lock() {
            return Err(ConsoleError::SubmissionFailed(status));
        }

        let id = format!("t{}", self.runs.lock().len() + 1);
        let run = sample_run(&id, &payload.title, 1.0);
        self.push_run(run.clone());
        Ok(run)
    }

    async fn latest_runs(&self) -> Vec<RunResponse> {
        self.log("runs".to_string());
        self.runs.lock().clone()
    }

    async fn pending_approvals(&self) -> Vec<PendingApproval> {
        self.log("pending".to_string());
        self.pending.lock().clone()
    }

    async fn approve_step(&self, step_id: &str) {
        self.log(format!("approve:{}", step_id));
        self.pending.lock().retain(|p| p.step_id != step_id);
    }
}
