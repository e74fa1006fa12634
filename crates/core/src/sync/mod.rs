//! Sync domain models and services.

pub mod events;
pub mod log;
pub mod orchestrator;
pub mod reconciler;
pub mod result;

pub use events::WebhookEvent;
pub use log::{
    derive_health, NewSyncLogEntry, SyncEntityKind, SyncHealth, SyncLogCompletion, SyncLogEntry,
    SyncLogStatus, SyncType,
};
pub use orchestrator::{SyncOrchestrator, APPOINTMENT_LOOKAHEAD_DAYS, APPOINTMENT_LOOKBACK_DAYS};
pub use reconciler::{
    ReconcileReport, ScheduledReconciler, RECONCILE_INTERVAL_SECS, RECONCILE_JITTER_SECS,
};
pub use result::{SyncError, SyncOperation, SyncOutcome};

#[cfg(test)]
mod tests;
