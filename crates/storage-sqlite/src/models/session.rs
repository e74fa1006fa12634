use chrono::{DateTime, Utc};
use diesel::prelude::*;

use clinic_sync_core::entities::{Session, SessionUpsert};

use super::{enum_from_db, enum_to_db, utc_from_db, utc_to_db};
use crate::errors::StorageError;
use crate::schema::sessions;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = sessions)]
pub struct SessionDB {
    pub id: String,
    pub external_id: String,
    pub practitioner_id: String,
    pub client_id: String,
    pub scheduled_start: String,
    pub scheduled_end: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    pub session_number: i32,
    pub status: String,
    pub billing_code: Option<String>,
    pub fee_cents: Option<i64>,
}

impl SessionDB {
    pub fn from_upsert(upsert: &SessionUpsert, id: String) -> Result<Self, StorageError> {
        Ok(Self {
            id,
            external_id: upsert.external_id.clone(),
            practitioner_id: upsert.practitioner_id.clone(),
            client_id: upsert.client_id.clone(),
            scheduled_start: utc_to_db(upsert.scheduled_start),
            scheduled_end: utc_to_db(upsert.scheduled_end),
            actual_start: upsert.actual_start.map(utc_to_db),
            actual_end: upsert.actual_end.map(utc_to_db),
            session_number: upsert.session_number,
            status: enum_to_db(&upsert.status)?,
            billing_code: upsert.billing_code.clone(),
            fee_cents: upsert.fee_cents,
        })
    }
}

impl TryFrom<SessionDB> for Session {
    type Error = StorageError;

    fn try_from(row: SessionDB) -> Result<Self, Self::Error> {
        Ok(Session {
            id: row.id,
            external_id: row.external_id,
            practitioner_id: row.practitioner_id,
            client_id: row.client_id,
            scheduled_start: utc_from_db(&row.scheduled_start)?,
            scheduled_end: utc_from_db(&row.scheduled_end)?,
            actual_start: row.actual_start.as_deref().map(utc_from_db).transpose()?,
            actual_end: row.actual_end.as_deref().map(utc_from_db).transpose()?,
            session_number: row.session_number,
            status: enum_from_db(&row.status)?,
            billing_code: row.billing_code,
            fee_cents: row.fee_cents,
        })
    }
}

/// Update half of the session upsert. `session_number` is deliberately
/// absent: the number assigned at insert is final.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = sessions, treat_none_as_null = true)]
pub struct SessionChangeset {
    pub practitioner_id: String,
    pub client_id: String,
    pub scheduled_start: String,
    pub scheduled_end: String,
    pub actual_start: Option<String>,
    pub actual_end: Option<String>,
    pub status: String,
    pub billing_code: Option<String>,
    pub fee_cents: Option<i64>,
}

impl SessionChangeset {
    pub fn from_upsert(upsert: &SessionUpsert) -> Result<Self, StorageError> {
        Ok(Self {
            practitioner_id: upsert.practitioner_id.clone(),
            client_id: upsert.client_id.clone(),
            scheduled_start: utc_to_db(upsert.scheduled_start),
            scheduled_end: utc_to_db(upsert.scheduled_end),
            actual_start: upsert.actual_start.map(utc_to_db),
            actual_end: upsert.actual_end.map(utc_to_db),
            status: enum_to_db(&upsert.status)?,
            billing_code: upsert.billing_code.clone(),
            fee_cents: upsert.fee_cents,
        })
    }
}
