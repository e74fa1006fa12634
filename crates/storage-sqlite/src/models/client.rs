use chrono::{DateTime, Utc};
use diesel::prelude::*;

use clinic_sync_core::entities::{Client, ClientUpsert};

use super::{date_from_db, date_to_db, utc_from_db, utc_to_db};
use crate::errors::StorageError;
use crate::schema::clients;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = clients)]
pub struct ClientDB {
    pub id: String,
    pub external_id: String,
    pub practitioner_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub presenting_issues: Option<String>,
    pub mhcp_total_sessions: Option<i32>,
    pub mhcp_used_sessions: i32,
    pub is_active: bool,
    pub last_synced_at: String,
}

impl ClientDB {
    pub fn from_upsert(upsert: &ClientUpsert, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            external_id: upsert.external_id.clone(),
            practitioner_id: upsert.practitioner_id.clone(),
            first_name: upsert.first_name.clone(),
            last_name: upsert.last_name.clone(),
            date_of_birth: upsert.date_of_birth.map(date_to_db),
            email: upsert.email.clone(),
            phone: upsert.phone.clone(),
            presenting_issues: upsert.presenting_issues.clone(),
            mhcp_total_sessions: upsert.mhcp_total_sessions,
            mhcp_used_sessions: 0,
            is_active: upsert.is_active,
            last_synced_at: utc_to_db(now),
        }
    }
}

impl TryFrom<ClientDB> for Client {
    type Error = StorageError;

    fn try_from(row: ClientDB) -> Result<Self, Self::Error> {
        Ok(Client {
            id: row.id,
            external_id: row.external_id,
            practitioner_id: row.practitioner_id,
            first_name: row.first_name,
            last_name: row.last_name,
            date_of_birth: row.date_of_birth.as_deref().map(date_from_db).transpose()?,
            email: row.email,
            phone: row.phone,
            presenting_issues: row.presenting_issues,
            mhcp_total_sessions: row.mhcp_total_sessions,
            mhcp_used_sessions: row.mhcp_used_sessions,
            is_active: row.is_active,
            last_synced_at: utc_from_db(&row.last_synced_at)?,
        })
    }
}

/// Update half of the client upsert. `mhcp_used_sessions` is locally derived
/// and never written here; a `None` for `presenting_issues` skips the column
/// so the local note survives remote updates, while the other optional
/// columns are nulled out when the remote clears them.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = clients)]
pub struct ClientChangeset {
    pub practitioner_id: String,
    pub first_name: String,
    pub last_name: String,
    #[diesel(treat_none_as_null = true)]
    pub date_of_birth: Option<String>,
    #[diesel(treat_none_as_null = true)]
    pub email: Option<String>,
    #[diesel(treat_none_as_null = true)]
    pub phone: Option<String>,
    pub presenting_issues: Option<String>,
    #[diesel(treat_none_as_null = true)]
    pub mhcp_total_sessions: Option<i32>,
    pub is_active: bool,
    pub last_synced_at: String,
}

impl ClientChangeset {
    pub fn from_upsert(upsert: &ClientUpsert, now: DateTime<Utc>) -> Self {
        Self {
            practitioner_id: upsert.practitioner_id.clone(),
            first_name: upsert.first_name.clone(),
            last_name: upsert.last_name.clone(),
            date_of_birth: upsert.date_of_birth.map(date_to_db),
            email: upsert.email.clone(),
            phone: upsert.phone.clone(),
            presenting_issues: upsert.presenting_issues.clone(),
            mhcp_total_sessions: upsert.mhcp_total_sessions,
            is_active: upsert.is_active,
            last_synced_at: utc_to_db(now),
        }
    }
}
