//! Client synchronization workflow.
//!
//! Two independently owned state containers:
//! - [`Dashboard`]: latest runs, headline metrics, loading flag
//! - [`ApprovalQueue`]: pending approvals
//!
//! The queue reaches the dashboard only through [`ApprovalObserver`], so an
//! approve action propagates as approve → queue refresh → dashboard refresh.

pub mod approvals;
pub mod dashboard;
pub mod form;
pub mod view;

#[cfg(test)]
pub(crate) mod fake;

pub use approvals::{ApprovalObserver, ApprovalQueue};
pub use dashboard::{Dashboard, DashboardState};
pub use form::TaskForm;
pub use view::{headline_cards, MetricCard, RunRow};

use std::sync::Arc;

use crate::client::Upstream;

/// Dashboard and approval queue wired together
pub struct OpsConsole {
    pub dashboard: Arc<Dashboard>,
    pub approvals: ApprovalQueue,
}

impl OpsConsole {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        let dashboard = Arc::new(Dashboard::new(upstream.clone()));
        let approvals = ApprovalQueue::new(upstream, dashboard.clone());
        Self {
            dashboard,
            approvals,
        }
    }

    /// Build and run both initial refreshes. The two reads are independent
    /// and run concurrently.
    pub async fn mount(upstream: Arc<dyn Upstream>) -> Self {
        let console = Self::new(upstream);
        tokio::join!(console.dashboard.mount(), console.approvals.mount());
        console
    }
}
