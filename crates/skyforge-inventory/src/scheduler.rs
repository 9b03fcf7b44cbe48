//! Fixed-interval reconciliation scheduler

use crate::reconciler::Reconciler;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Fires a reconciliation cycle every `interval`
///
/// Cycles are spawned, not awaited, so a slow cycle does not delay the next
/// tick and cycles may overlap.
pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl Scheduler {
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Tick until `shutdown` resolves. Returns the number of cycles started.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> usize {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            "Inventory sync scheduled every {}s",
            self.interval.as_secs()
        );

        let mut started = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Inventory scheduler stopping after {} cycles", started);
                    return started;
                }
                _ = ticker.tick() => {
                    started += 1;
                    let reconciler = self.reconciler.clone();
                    tokio::spawn(async move {
                        if let Err(e) = reconciler.sync_all().await {
                            tracing::error!("Inventory sync cycle failed: {}", e);
                        }
                    });
                }
            }
        }
    }
}
