//! Task submission form state.

use crate::error::{ConsoleError, ConsoleResult};
use crate::types::{RiskLevel, TaskPayload};

/// Operator-editable task form. Defaults to empty text and `medium` risk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub desired_outcome: String,
    pub risk_level: RiskLevel,
}

impl TaskForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_risk_level(&mut self, raw: &str) -> ConsoleResult<()> {
        self.risk_level = raw.parse()?;
        Ok(())
    }

    /// Enforce required fields and build the payload.
    ///
    /// Runs before any network call; a blank field never reaches the upstream.
    pub fn validate(&self) -> ConsoleResult<TaskPayload> {
        require("title", &self.title)?;
        require("description", &self.description)?;
        require("desired_outcome", &self.desired_outcome)?;

        Ok(TaskPayload {
            title: self.title.clone(),
            description: self.description.clone(),
            risk_level: self.risk_level,
            desired_outcome: self.desired_outcome.clone(),
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn require(field: &'static str, value: &str) -> ConsoleResult<()> {
    if value.trim().is_empty() {
        return Err(ConsoleError::MissingField(field));
    }
    Ok(())
}
