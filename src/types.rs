//! Wire types shared with the upstream orchestration service.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConsoleError;

// ============================================================================
// TASK SUBMISSION
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ConsoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(ConsoleError::InvalidRiskLevel(s.to_string())),
        }
    }
}

/// Body of `POST /tasks`. Immutable once built; construct through `TaskForm`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub title: String,
    pub description: String,
    pub risk_level: RiskLevel,
    pub desired_outcome: String,
}

// ============================================================================
// RUNS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique within a run
    pub id: String,
    pub tool: String,
    pub instruction: String,
    #[serde(default)]
    pub needs_approval: bool,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub step_id: String,
    pub success: bool,
    pub output: String,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Per-run aggregate computed upstream. Rates are in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub success_rate: f64,
    pub hallucination_rate: f64,
    pub p95_latency_ms: f64,
    pub total_cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResponse {
    pub task: TaskRef,
    pub plan: Vec<PlanStep>,
    pub results: Vec<ExecutionResult>,
    pub metrics: Metrics,
}

impl RunResponse {
    /// Steps in this run that sit behind a human approval gate
    pub fn gated_steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.plan.iter().filter(|s| s.needs_approval)
    }

    pub fn result_for(&self, step_id: &str) -> Option<&ExecutionResult> {
        self.results.iter().find(|r| r.step_id == step_id)
    }
}

// ============================================================================
// APPROVALS
// ============================================================================

/// Entry of `GET /approvals/pending`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingApproval {
    pub step_id: String,
    pub status: String,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<NaiveDateTime>,
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<NaiveDateTime>,
}

/// Body returned by `POST /approvals/{step_id}:approve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalReceipt {
    pub step_id: String,
    pub status: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<NaiveDateTime>,
}

/// Parse a UTC timestamp in any of the shapes the upstream emits.
///
/// Offset-aware values are normalized to UTC. Date-only values map to
/// midnight. Anything else is `None`.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(naive) = raw.parse::<NaiveDateTime>() {
        return Some(naive);
    }
    raw.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Timestamps are informational; an unreadable one must not sink the record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(parse_timestamp))
}
