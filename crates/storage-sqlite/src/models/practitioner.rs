use chrono::{DateTime, Utc};
use diesel::prelude::*;

use clinic_sync_core::entities::{Practitioner, PractitionerUpsert};

use super::{utc_from_db, utc_to_db};
use crate::errors::StorageError;
use crate::schema::practitioners;

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = practitioners)]
pub struct PractitionerDB {
    pub id: String,
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub is_active: bool,
    pub last_synced_at: String,
}

impl PractitionerDB {
    pub fn from_upsert(upsert: &PractitionerUpsert, id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            external_id: upsert.external_id.clone(),
            first_name: upsert.first_name.clone(),
            last_name: upsert.last_name.clone(),
            email: upsert.email.clone(),
            phone: upsert.phone.clone(),
            specialty: upsert.specialty.clone(),
            is_active: upsert.is_active,
            last_synced_at: utc_to_db(now),
        }
    }
}

impl TryFrom<PractitionerDB> for Practitioner {
    type Error = StorageError;

    fn try_from(row: PractitionerDB) -> Result<Self, Self::Error> {
        Ok(Practitioner {
            id: row.id,
            external_id: row.external_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            specialty: row.specialty,
            is_active: row.is_active,
            last_synced_at: utc_from_db(&row.last_synced_at)?,
        })
    }
}

/// Update half of the practitioner upsert. `id` and `external_id` never
/// change on conflict.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = practitioners, treat_none_as_null = true)]
pub struct PractitionerChangeset {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub is_active: bool,
    pub last_synced_at: String,
}

impl PractitionerChangeset {
    pub fn from_upsert(upsert: &PractitionerUpsert, now: DateTime<Utc>) -> Self {
        Self {
            first_name: upsert.first_name.clone(),
            last_name: upsert.last_name.clone(),
            email: upsert.email.clone(),
            phone: upsert.phone.clone(),
            specialty: upsert.specialty.clone(),
            is_active: upsert.is_active,
            last_synced_at: utc_to_db(now),
        }
    }
}
