//! Dashboard state: latest runs, headline metrics and the loading flag.
//!
//! Every mutation is a thin upstream call followed by a full re-read. Local
//! state is replaced wholesale, never edited in place.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::client::Upstream;
use crate::error::ConsoleResult;
use crate::types::{Metrics, RunResponse, TaskPayload};
use crate::workflow::approvals::ApprovalObserver;
use crate::workflow::form::TaskForm;
use crate::workflow::view::{headline_cards, MetricCard, RunRow};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    /// Metrics of the newest run seen so far
    pub metrics: Option<Metrics>,
    /// Most recent run first
    pub runs: Vec<RunResponse>,
    pub loading: bool,
}

pub struct Dashboard {
    upstream: Arc<dyn Upstream>,
    state: RwLock<DashboardState>,
    /// Writes currently in flight; `loading` mirrors `> 0`
    inflight: Mutex<usize>,
}

/// Counts one in-flight write for its lifetime.
///
/// `loading` stays set until the last overlapping write settles.
struct LoadingGuard<'a> {
    dashboard: &'a Dashboard,
}

impl<'a> LoadingGuard<'a> {
    fn enter(dashboard: &'a Dashboard) -> Self {
        let mut inflight = dashboard.inflight.lock();
        *inflight += 1;
        dashboard.state.write().loading = true;
        Self { dashboard }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut inflight = self.dashboard.inflight.lock();
        *inflight = inflight.saturating_sub(1);
        self.dashboard.state.write().loading = *inflight > 0;
    }
}

impl Dashboard {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            upstream,
            state: RwLock::new(DashboardState::default()),
            inflight: Mutex::new(0),
        }
    }

    pub async fn mount(&self) {
        self.refresh().await;
    }

    /// Re-read the latest runs. Metrics follow element 0 and are left
    /// untouched when the list comes back empty.
    pub async fn refresh(&self) {
        let latest = self.upstream.latest_runs().await;
        debug!("Dashboard refreshed: {} runs", latest.len());

        let mut state = self.state.write();
        if let Some(newest) = latest.first() {
            state.metrics = Some(newest.metrics);
        }
        state.runs = latest;
    }

    /// Submit a task, then refresh.
    ///
    /// `loading` is set for the duration of the write and cleared on every exit
    /// path once no other write is in flight. The refresh runs whether or not the write succeeded; a failed
    /// write is returned after it.
    pub async fn submit(&self, payload: &TaskPayload) -> ConsoleResult<RunResponse> {
        let result = {
            let _loading = LoadingGuard::enter(self);
            self.upstream.submit_task(payload).await
        };

        match &result {
            Ok(run) => info!("Task {} submitted as run {}", payload.title, run.task.id),
            Err(e) => warn!("Task {} failed: {}", payload.title, e),
        }

        self.refresh().await;
        result
    }

    /// Validate the form, submit it and reset it on success.
    ///
    /// A form missing a required field fails before any upstream call.
    pub async fn submit_form(&self, form: &mut TaskForm) -> ConsoleResult<RunResponse> {
        let payload = form.validate()?;
        let run = self.submit(&payload).await?;
        form.reset();
        Ok(run)
    }

    pub fn snapshot(&self) -> DashboardState {
        self.state.read().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().loading
    }

    pub fn metrics(&self) -> Option<Metrics> {
        self.state.read().metrics
    }

    pub fn metric_cards(&self) -> [MetricCard; 3] {
        headline_cards(self.state.read().metrics.as_ref())
    }

    pub fn run_rows(&self) -> Vec<RunRow> {
        self.state.read().runs.iter().map(RunRow::from).collect()
    }
}

#[async_trait]
impl ApprovalObserver for Dashboard {
    async fn on_approved(&self, step_id: &str) {
        debug!("Step {} approved, refreshing runs", step_id);
        self.refresh().await;
    }
}
