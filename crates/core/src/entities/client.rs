use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A client (patient) mirrored from the remote platform.
///
/// Two fields are locally owned and never overwritten from the remote side:
/// `mhcp_used_sessions` is derived from the client's completed sessions, and
/// `presenting_issues` is merge-preserved (only replaced by a non-null remote
/// value).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    /// Immutable join key assigned by the remote platform.
    pub external_id: String,
    /// Local id of the owning practitioner.
    pub practitioner_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub presenting_issues: Option<String>,
    /// Capped session count of the client's MHCP plan, if any.
    pub mhcp_total_sessions: Option<i32>,
    /// Locally derived count of completed sessions. Never remote-authoritative.
    pub mhcp_used_sessions: i32,
    pub is_active: bool,
    pub last_synced_at: DateTime<Utc>,
}

/// Write model produced by the transformer for a client upsert.
///
/// `presenting_issues: None` means "keep whatever the local row has"; the
/// store must not null the column out for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpsert {
    pub external_id: String,
    pub practitioner_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub presenting_issues: Option<String>,
    pub mhcp_total_sessions: Option<i32>,
    pub is_active: bool,
}
