//! Structured results returned by sync entry points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::log::SyncEntityKind;

/// Operation being attempted when a per-entity error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Fetch,
    Create,
    Update,
    Delete,
}

/// One caught per-entity failure. Aggregated into the run's outcome and log
/// message; not separately persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    pub entity_kind: SyncEntityKind,
    pub entity_id: String,
    pub operation: SyncOperation,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SyncError {
    pub fn new(
        entity_kind: SyncEntityKind,
        entity_id: impl Into<String>,
        operation: SyncOperation,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity_kind,
            entity_id: entity_id.into(),
            operation,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Outcome of one sync call. Entry points always return this; callers never
/// see raw errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub success: bool,
    pub records_created: usize,
    pub records_updated: usize,
    /// Soft transitions (cancelled session, deactivated client). Rows are
    /// never hard-deleted.
    pub records_deleted: usize,
    pub errors: Vec<SyncError>,
    pub duration_ms: i64,
}

impl SyncOutcome {
    pub fn records_processed(&self) -> usize {
        self.records_created + self.records_updated + self.records_deleted
    }
}
