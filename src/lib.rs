//! Ops Console for a multi-agent task pipeline
//!
//! Operators submit tasks, inspect run plans, results and metrics, and approve
//! gated steps. The remote orchestration service (the "upstream") is opaque
//! and reached only over HTTP.
//!
//! ## Module Structure
//!
//! - `config`: process-wide gateway configuration
//! - `error`: error taxonomy
//! - `types`: wire types shared with the upstream
//! - `client`: typed upstream accessors
//! - `gateway`: `/proxy/{path}` forwarding route with a bounded POST path
//! - `workflow`: dashboard / approval-queue synchronization

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod types;
pub mod workflow;

pub use client::{Upstream, UpstreamClient};
pub use config::{GatewayConfig, DEFAULT_FORWARD_TIMEOUT_MS, DEFAULT_UPSTREAM_BASE};
pub use error::{ConsoleError, ConsoleResult};
pub use gateway::{router, run_gateway, GatewayState, UPSTREAM_TIMEOUT_BODY};
pub use types::{
    ApprovalReceipt, ExecutionResult, Metrics, PendingApproval, PlanStep, RiskLevel, RunResponse,
    TaskPayload, TaskRef,
};
pub use workflow::{ApprovalObserver, ApprovalQueue, Dashboard, OpsConsole, TaskForm};
