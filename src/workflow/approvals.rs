//! Approval queue
//!
//! Owns the pending-approval list independently of the dashboard. After an
//! approve action it re-reads its own list and then notifies an injected
//! observer, so the dashboard can refresh runs and metrics without sharing
//! state with the queue.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

use crate::client::Upstream;
use crate::types::PendingApproval;

/// Notified once an approve action and the queue's own re-read have finished
#[async_trait]
pub trait ApprovalObserver: Send + Sync {
    async fn on_approved(&self, step_id: &str);
}

pub struct ApprovalQueue {
    upstream: Arc<dyn Upstream>,
    observer: Arc<dyn ApprovalObserver>,
    pending: RwLock<Vec<PendingApproval>>,
}

impl ApprovalQueue {
    pub fn new(upstream: Arc<dyn Upstream>, observer: Arc<dyn ApprovalObserver>) -> Self {
        Self {
            upstream,
            observer,
            pending: RwLock::new(Vec::new()),
        }
    }

    pub async fn mount(&self) {
        self.refresh().await;
    }

    /// Replace the pending list wholesale with the upstream's view
    pub async fn refresh(&self) {
        let latest = self.upstream.pending_approvals().await;
        debug!("Approval queue refreshed: {} pending", latest.len());
        *self.pending.write() = latest;
    }

    /// Approve, re-read the queue, then notify the observer. Strictly in that order.
    pub async fn approve(&self, step_id: &str) {
        info!("Approving step {}", step_id);
        self.upstream.approve_step(step_id).await;
        self.refresh().await;
        self.observer.on_approved(step_id).await;
    }

    pub fn pending(&self) -> Vec<PendingApproval> {
        self.pending.read().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.read().is_empty()
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.pending.read().iter().any(|p| p.step_id == step_id)
    }
}
