//! Error types for the ops console

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for console operations
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Errors raised by the upstream client and the sync workflow.
///
/// The gateway never hands these to its HTTP caller; transport failures on the
/// forwarding path are folded into a fixed `504` response instead.
#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid risk level: {0}")]
    InvalidRiskLevel(String),

    #[error("Task submission failed: upstream returned {0}")]
    SubmissionFailed(StatusCode),

    #[error("Approval failed: upstream returned {0}")]
    ApprovalRejected(StatusCode),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ConsoleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ConsoleError::Decode(err.to_string())
        } else {
            ConsoleError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ConsoleError {
    fn from(err: serde_json::Error) -> Self {
        ConsoleError::Decode(err.to_string())
    }
}
