use std::sync::Arc;
use std::time::Duration;

use task_supervisor::{SupervisedTask, TaskError};

use crate::reconciler::RewardReconciler;

/// Periodic reward-reconciliation pass. Independent of the ingestion loop:
/// a wedged reconciler never blocks market indexing.
#[derive(Clone)]
pub struct RewardsTask {
    reconciler: Arc<RewardReconciler>,
    interval: Duration,
}

impl RewardsTask {
    pub fn new(reconciler: Arc<RewardReconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }
}

impl SupervisedTask for RewardsTask {
    async fn run(&mut self) -> Result<(), TaskError> {
        loop {
            match self.reconciler.reconcile().await {
                Ok(claims) => {
                    tracing::debug!(
                        "[RewardsTask] ✅ Reconciliation pass done ({claims} claim row(s))"
                    );
                }
                Err(e) => {
                    // The watermark did not advance; the next pass re-covers
                    // the same window.
                    tracing::warn!(error = %e, "[RewardsTask] ⚠️ Reconciliation pass failed");
                }
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
