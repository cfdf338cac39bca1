//! Display view-models for the dashboard cards and runs table.

use std::fmt;

use crate::types::{Metrics, RunResponse};

#[derive(Debug, Clone, PartialEq)]
pub struct MetricCard {
    pub title: &'static str,
    pub value: f64,
    pub suffix: &'static str,
}

impl fmt::Display for MetricCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.suffix)
    }
}

/// Headline cards; all zero until a run has been seen
pub fn headline_cards(metrics: Option<&Metrics>) -> [MetricCard; 3] {
    let (success, hallucination, latency) = match metrics {
        Some(m) => (
            m.success_rate * 100.0,
            m.hallucination_rate * 100.0,
            m.p95_latency_ms,
        ),
        None => (0.0, 0.0, 0.0),
    };

    [
        MetricCard {
            title: "Success %",
            value: success,
            suffix: "%",
        },
        MetricCard {
            title: "Hallucination %",
            value: hallucination,
            suffix: "%",
        },
        MetricCard {
            title: "p95 Latency",
            value: latency,
            suffix: "ms",
        },
    ]
}

/// One row of the runs table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRow {
    pub task_id: String,
    pub title: String,
    pub steps: usize,
    pub success_pct: i64,
}

impl From<&RunResponse> for RunRow {
    fn from(run: &RunResponse) -> Self {
        Self {
            task_id: run.task.id.clone(),
            title: run.task.title.clone(),
            steps: run.plan.len(),
            success_pct: (run.metrics.success_rate * 100.0).round() as i64,
        }
    }
}

impl RunRow {
    pub fn success_label(&self) -> String {
        format!("{}%", self.success_pct)
    }
}
