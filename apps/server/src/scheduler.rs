//! Background reconciliation loop.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tracing::info;

use clinic_sync_core::sync::{ScheduledReconciler, RECONCILE_JITTER_SECS};

/// Spawns the periodic reconciliation task. The first pass runs after a
/// random jitter so restarted fleets do not all hit the platform at once.
pub fn spawn(reconciler: Arc<ScheduledReconciler>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if !reconciler.is_enabled() {
            info!("[Scheduler] Remote platform not configured; reconciliation disabled");
            return;
        }

        let jitter = rand::thread_rng().gen_range(0..=RECONCILE_JITTER_SECS);
        info!(
            "[Scheduler] Reconciling every {:?}, first pass in {}s",
            interval, jitter
        );
        tokio::time::sleep(Duration::from_secs(jitter)).await;

        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let report = reconciler.run_once().await;
            info!(
                "[Scheduler] Pass done: {} synced, {} failed",
                report.practitioners_synced, report.practitioners_failed
            );
        }
    })
}
