//! Scheduled reconciliation over every active practitioner.

use std::sync::Arc;

use log::{error, info, warn};

use crate::store::PracticeStore;
use crate::sync::orchestrator::SyncOrchestrator;

/// Cadence of the reconciliation loop.
pub const RECONCILE_INTERVAL_SECS: u64 = 15 * 60;
/// Random startup offset so multiple hosts do not hit the remote platform in
/// lockstep.
pub const RECONCILE_JITTER_SECS: u64 = 30;

/// Counts for one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub practitioners_synced: usize,
    pub practitioners_failed: usize,
    /// True when the pass did not run (reconciliation disabled).
    pub skipped: bool,
}

/// Drives periodic full syncs. The host owns the timer; this type owns one
/// pass, isolating each practitioner so one failure never starves the rest.
pub struct ScheduledReconciler {
    store: Arc<dyn PracticeStore>,
    orchestrator: Arc<SyncOrchestrator>,
    enabled: bool,
}

impl ScheduledReconciler {
    pub fn new(
        store: Arc<dyn PracticeStore>,
        orchestrator: Arc<SyncOrchestrator>,
        enabled: bool,
    ) -> Self {
        Self {
            store,
            orchestrator,
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// One reconciliation pass over every active practitioner, sequentially.
    pub async fn run_once(&self) -> ReconcileReport {
        if !self.enabled {
            return ReconcileReport {
                skipped: true,
                ..Default::default()
            };
        }

        let practitioners = match self.store.active_practitioners().await {
            Ok(practitioners) => practitioners,
            Err(err) => {
                error!("[Reconcile] Could not list active practitioners: {}", err);
                return ReconcileReport::default();
            }
        };
        if practitioners.is_empty() {
            info!("[Reconcile] No active practitioners to reconcile");
            return ReconcileReport::default();
        }

        info!("[Reconcile] Reconciling {} practitioner(s)", practitioners.len());
        let mut report = ReconcileReport::default();
        for practitioner in &practitioners {
            let outcome = self.orchestrator.full_sync(&practitioner.external_id).await;
            if outcome.success {
                report.practitioners_synced += 1;
            } else {
                report.practitioners_failed += 1;
                warn!(
                    "[Reconcile] Practitioner {} finished with {} error(s)",
                    practitioner.external_id,
                    outcome.errors.len()
                );
            }
        }
        info!(
            "[Reconcile] Pass complete: {} synced, {} failed",
            report.practitioners_synced, report.practitioners_failed
        );
        report
    }
}
