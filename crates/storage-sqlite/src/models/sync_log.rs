use chrono::{DateTime, Utc};
use diesel::prelude::*;

use clinic_sync_core::sync::{NewSyncLogEntry, SyncLogEntry, SyncLogStatus};

use super::{enum_from_db, enum_to_db, utc_from_db, utc_to_db};
use crate::errors::StorageError;
use crate::schema::sync_logs;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = sync_logs)]
pub struct SyncLogDB {
    pub id: String,
    pub sync_type: String,
    pub entity_kind: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub records_processed: i32,
    pub error_message: Option<String>,
    pub practitioner_external_id: Option<String>,
}

impl SyncLogDB {
    pub fn open(entry: &NewSyncLogEntry, id: String, now: DateTime<Utc>) -> Result<Self, StorageError> {
        Ok(Self {
            id,
            sync_type: enum_to_db(&entry.sync_type)?,
            entity_kind: enum_to_db(&entry.entity_kind)?,
            status: enum_to_db(&SyncLogStatus::InProgress)?,
            started_at: utc_to_db(now),
            completed_at: None,
            records_processed: 0,
            error_message: None,
            practitioner_external_id: entry.practitioner_external_id.clone(),
        })
    }
}

impl TryFrom<SyncLogDB> for SyncLogEntry {
    type Error = StorageError;

    fn try_from(row: SyncLogDB) -> Result<Self, Self::Error> {
        Ok(SyncLogEntry {
            id: row.id,
            sync_type: enum_from_db(&row.sync_type)?,
            entity_kind: enum_from_db(&row.entity_kind)?,
            status: enum_from_db(&row.status)?,
            started_at: utc_from_db(&row.started_at)?,
            completed_at: row.completed_at.as_deref().map(utc_from_db).transpose()?,
            records_processed: row.records_processed,
            error_message: row.error_message,
            practitioner_external_id: row.practitioner_external_id,
        })
    }
}
