use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a session. Delete-type webhook events soft-transition
/// a session to `Cancelled`; rows are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl SessionStatus {
    /// Completed sessions are the basis for session numbering and the
    /// derived MHCP used-session count.
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// A session (appointment) mirrored from the remote platform.
///
/// `session_number` is assigned once at first sync of the appointment and is
/// never recomputed on later updates to the same row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Immutable join key assigned by the remote platform.
    pub external_id: String,
    pub practitioner_id: String,
    pub client_id: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub session_number: i32,
    pub status: SessionStatus,
    pub billing_code: Option<String>,
    pub fee_cents: Option<i64>,
}

/// Write model produced by the transformer for a session upsert.
///
/// `session_number` applies on insert only; updates to an existing row keep
/// the stored number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUpsert {
    pub external_id: String,
    pub practitioner_id: String,
    pub client_id: String,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: DateTime<Utc>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub session_number: i32,
    pub status: SessionStatus,
    pub billing_code: Option<String>,
    pub fee_cents: Option<i64>,
}
