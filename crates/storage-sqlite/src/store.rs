//! [`PracticeStore`] backed by SQLite through diesel.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::Text;
use uuid::Uuid;

use clinic_sync_core::entities::{
    Client, ClientUpsert, Practitioner, PractitionerRef, PractitionerUpsert, Session,
    SessionStatus, SessionUpsert, Upserted,
};
use clinic_sync_core::store::PracticeStore;
use clinic_sync_core::sync::{NewSyncLogEntry, SyncLogCompletion, SyncLogEntry};
use clinic_sync_core::Result;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::models::{
    enum_to_db, utc_to_db, ClientChangeset, ClientDB, PractitionerChangeset, PractitionerDB,
    SessionChangeset, SessionDB, SyncLogDB,
};
use crate::schema::{clients, practitioners, sessions, sync_logs};

pub struct SqliteStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        SqliteStore { pool, writer }
    }
}

#[async_trait]
impl PracticeStore for SqliteStore {
    async fn find_practitioner_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Practitioner>> {
        let mut conn = get_connection(&self.pool)?;
        let row = practitioners::table
            .filter(practitioners::external_id.eq(external_id))
            .first::<PractitionerDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Practitioner::try_from).transpose()?)
    }

    async fn upsert_practitioner(
        &self,
        upsert: PractitionerUpsert,
    ) -> Result<Upserted<Practitioner>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Upserted<Practitioner>> {
                let now = Utc::now();
                let existed: i64 = practitioners::table
                    .filter(practitioners::external_id.eq(&upsert.external_id))
                    .count()
                    .get_result(conn)
                    .map_err(StorageError::from)?;

                let row = PractitionerDB::from_upsert(&upsert, Uuid::new_v4().to_string(), now);
                let changeset = PractitionerChangeset::from_upsert(&upsert, now);
                diesel::insert_into(practitioners::table)
                    .values(&row)
                    .on_conflict(practitioners::external_id)
                    .do_update()
                    .set(&changeset)
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let stored = practitioners::table
                    .filter(practitioners::external_id.eq(&upsert.external_id))
                    .first::<PractitionerDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(Upserted {
                    entity: Practitioner::try_from(stored)?,
                    created: existed == 0,
                })
            })
            .await
    }

    async fn active_practitioners(&self) -> Result<Vec<PractitionerRef>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = practitioners::table
            .filter(practitioners::is_active.eq(true))
            .select((practitioners::id, practitioners::external_id))
            .order(practitioners::external_id.asc())
            .load::<(String, String)>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(rows
            .into_iter()
            .map(|(local_id, external_id)| PractitionerRef {
                local_id,
                external_id,
            })
            .collect())
    }

    async fn find_client_by_external_id(&self, external_id: &str) -> Result<Option<Client>> {
        let mut conn = get_connection(&self.pool)?;
        let row = clients::table
            .filter(clients::external_id.eq(external_id))
            .first::<ClientDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Client::try_from).transpose()?)
    }

    async fn upsert_client(&self, upsert: ClientUpsert) -> Result<Upserted<Client>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Upserted<Client>> {
                let now = Utc::now();
                let existed: i64 = clients::table
                    .filter(clients::external_id.eq(&upsert.external_id))
                    .count()
                    .get_result(conn)
                    .map_err(StorageError::from)?;

                let row = ClientDB::from_upsert(&upsert, Uuid::new_v4().to_string(), now);
                let changeset = ClientChangeset::from_upsert(&upsert, now);
                diesel::insert_into(clients::table)
                    .values(&row)
                    .on_conflict(clients::external_id)
                    .do_update()
                    .set(&changeset)
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let stored = clients::table
                    .filter(clients::external_id.eq(&upsert.external_id))
                    .first::<ClientDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(Upserted {
                    entity: Client::try_from(stored)?,
                    created: existed == 0,
                })
            })
            .await
    }

    async fn deactivate_client_by_external_id(&self, external_id: &str) -> Result<bool> {
        let external_id = external_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let affected = diesel::update(
                    clients::table.filter(clients::external_id.eq(&external_id)),
                )
                .set((
                    clients::is_active.eq(false),
                    clients::last_synced_at.eq(utc_to_db(Utc::now())),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn find_session_by_external_id(&self, external_id: &str) -> Result<Option<Session>> {
        let mut conn = get_connection(&self.pool)?;
        let row = sessions::table
            .filter(sessions::external_id.eq(external_id))
            .first::<SessionDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(row.map(Session::try_from).transpose()?)
    }

    async fn upsert_session(&self, upsert: SessionUpsert) -> Result<Upserted<Session>> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Upserted<Session>> {
                let existed: i64 = sessions::table
                    .filter(sessions::external_id.eq(&upsert.external_id))
                    .count()
                    .get_result(conn)
                    .map_err(StorageError::from)?;

                let row = SessionDB::from_upsert(&upsert, Uuid::new_v4().to_string())?;
                let changeset = SessionChangeset::from_upsert(&upsert)?;
                diesel::insert_into(sessions::table)
                    .values(&row)
                    .on_conflict(sessions::external_id)
                    .do_update()
                    .set(&changeset)
                    .execute(conn)
                    .map_err(StorageError::from)?;

                let stored = sessions::table
                    .filter(sessions::external_id.eq(&upsert.external_id))
                    .first::<SessionDB>(conn)
                    .map_err(StorageError::from)?;
                Ok(Upserted {
                    entity: Session::try_from(stored)?,
                    created: existed == 0,
                })
            })
            .await
    }

    async fn cancel_session_by_external_id(&self, external_id: &str) -> Result<bool> {
        let external_id = external_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let cancelled = enum_to_db(&SessionStatus::Cancelled)?;
                let affected = diesel::update(
                    sessions::table.filter(sessions::external_id.eq(&external_id)),
                )
                .set(sessions::status.eq(cancelled))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn completed_session_count(&self, client_id: &str) -> Result<i64> {
        let mut conn = get_connection(&self.pool)?;
        let completed = enum_to_db(&SessionStatus::Completed)?;
        let count = sessions::table
            .filter(sessions::client_id.eq(client_id))
            .filter(sessions::status.eq(completed))
            .count()
            .get_result::<i64>(&mut conn)
            .map_err(StorageError::from)?;
        Ok(count)
    }

    async fn recompute_mhcp_used_sessions(&self, practitioner_id: &str) -> Result<usize> {
        let practitioner_id = practitioner_id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let touched = diesel::sql_query(
                    "UPDATE clients SET mhcp_used_sessions = (\
                         SELECT COUNT(*) FROM sessions s \
                         WHERE s.client_id = clients.id AND s.status = 'completed'\
                     ) WHERE practitioner_id = ?",
                )
                .bind::<Text, _>(&practitioner_id)
                .execute(conn)
                .map_err(StorageError::from)?;
                log::debug!(
                    "[Store] Recomputed plan usage for {} client(s) of practitioner {}",
                    touched,
                    practitioner_id
                );
                Ok(touched)
            })
            .await
    }

    async fn open_sync_log(&self, entry: NewSyncLogEntry) -> Result<String> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<String> {
                let row = SyncLogDB::open(&entry, Uuid::new_v4().to_string(), Utc::now())?;
                diesel::insert_into(sync_logs::table)
                    .values(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(row.id)
            })
            .await
    }

    async fn finalize_sync_log(&self, id: &str, completion: SyncLogCompletion) -> Result<()> {
        let id = id.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                let status = enum_to_db(&completion.status)?;
                diesel::update(sync_logs::table.find(&id))
                    .set((
                        sync_logs::status.eq(status),
                        sync_logs::completed_at.eq(Some(utc_to_db(Utc::now()))),
                        sync_logs::records_processed.eq(completion.records_processed),
                        sync_logs::error_message.eq(completion.error_message),
                    ))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn recent_sync_logs(&self, limit: i64) -> Result<Vec<SyncLogEntry>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = sync_logs::table
            .order(sync_logs::started_at.desc())
            .limit(limit)
            .load::<SyncLogDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter()
            .map(|row| SyncLogEntry::try_from(row).map_err(Into::into))
            .collect()
    }
}
