//! Append-only sync audit log and derived health.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of sync run that produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncType {
    Full,
    Webhook,
}

/// Entity tag on a log entry. Full runs touch every kind and log `All`;
/// webhook runs log the kind derived from the event name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntityKind {
    Practitioner,
    Client,
    Session,
    All,
}

/// Lifecycle status of a log entry. An entry never remains `InProgress`
/// after the sync call that created it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncLogStatus {
    InProgress,
    Success,
    Error,
}

/// One immutable audit entry per sync call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub id: String,
    pub sync_type: SyncType,
    pub entity_kind: SyncEntityKind,
    pub status: SyncLogStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub practitioner_external_id: Option<String>,
}

/// Fields known when a sync call opens its log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncLogEntry {
    pub sync_type: SyncType,
    pub entity_kind: SyncEntityKind,
    pub practitioner_external_id: Option<String>,
}

/// Fields written when a sync call finalizes its log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncLogCompletion {
    pub status: SyncLogStatus,
    pub records_processed: i32,
    pub error_message: Option<String>,
}

/// Health of the mirror as derived from the newest log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncHealth {
    Healthy,
    Stale,
    Error,
    Unknown,
}

/// Derives health from the newest finalized entry: `Error` when it failed,
/// `Stale` when its completion is older than `stale_after`, `Unknown` when
/// nothing has finalized yet.
pub fn derive_health(
    latest: Option<&SyncLogEntry>,
    now: DateTime<Utc>,
    stale_after: Duration,
) -> SyncHealth {
    let Some(entry) = latest else {
        return SyncHealth::Unknown;
    };
    match entry.status {
        SyncLogStatus::Error => SyncHealth::Error,
        SyncLogStatus::InProgress => SyncHealth::Unknown,
        SyncLogStatus::Success => {
            let completed = entry.completed_at.unwrap_or(entry.started_at);
            if now - completed > stale_after {
                SyncHealth::Stale
            } else {
                SyncHealth::Healthy
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(status: SyncLogStatus, completed_mins_ago: i64) -> SyncLogEntry {
        let now = Utc::now();
        SyncLogEntry {
            id: "log-1".to_string(),
            sync_type: SyncType::Full,
            entity_kind: SyncEntityKind::All,
            status,
            started_at: now - Duration::minutes(completed_mins_ago + 1),
            completed_at: Some(now - Duration::minutes(completed_mins_ago)),
            records_processed: 3,
            error_message: None,
            practitioner_external_id: Some("PR1".to_string()),
        }
    }

    #[test]
    fn no_entries_is_unknown() {
        assert_eq!(
            derive_health(None, Utc::now(), Duration::minutes(30)),
            SyncHealth::Unknown
        );
    }

    #[test]
    fn recent_success_is_healthy() {
        let e = entry(SyncLogStatus::Success, 5);
        assert_eq!(
            derive_health(Some(&e), Utc::now(), Duration::minutes(30)),
            SyncHealth::Healthy
        );
    }

    #[test]
    fn old_success_is_stale() {
        let e = entry(SyncLogStatus::Success, 45);
        assert_eq!(
            derive_health(Some(&e), Utc::now(), Duration::minutes(30)),
            SyncHealth::Stale
        );
    }

    #[test]
    fn latest_error_is_error() {
        let e = entry(SyncLogStatus::Error, 1);
        assert_eq!(
            derive_health(Some(&e), Utc::now(), Duration::minutes(30)),
            SyncHealth::Error
        );
    }

    #[test]
    fn status_serialization_matches_store_contract() {
        assert_eq!(
            serde_json::to_string(&SyncLogStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(serde_json::to_string(&SyncType::Webhook).unwrap(), "\"webhook\"");
        assert_eq!(
            serde_json::to_string(&SyncEntityKind::Practitioner).unwrap(),
            "\"practitioner\""
        );
    }
}
