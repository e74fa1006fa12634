//! Persistent store contract.

use async_trait::async_trait;

use crate::entities::{
    Client, ClientUpsert, Practitioner, PractitionerRef, PractitionerUpsert, Session,
    SessionUpsert, Upserted,
};
use crate::sync::log::{NewSyncLogEntry, SyncLogCompletion, SyncLogEntry};
use crate::Result;

/// Durable storage for the four mirrored tables.
///
/// Upserts must be atomic and keyed on the unique external id, so that
/// concurrent deliveries for the same entity cannot race a lookup against a
/// write. Updates must preserve the locally-owned fields documented on each
/// entity (`session_number`, `mhcp_used_sessions`, merge-preserved
/// `presenting_issues`).
#[async_trait]
pub trait PracticeStore: Send + Sync {
    // Practitioners
    async fn find_practitioner_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Practitioner>>;
    async fn upsert_practitioner(&self, upsert: PractitionerUpsert)
        -> Result<Upserted<Practitioner>>;
    /// Practitioners eligible for scheduled reconciliation.
    async fn active_practitioners(&self) -> Result<Vec<PractitionerRef>>;

    // Clients
    async fn find_client_by_external_id(&self, external_id: &str) -> Result<Option<Client>>;
    async fn upsert_client(&self, upsert: ClientUpsert) -> Result<Upserted<Client>>;
    /// Soft delete: flips `is_active` off. Returns false when no row matched.
    async fn deactivate_client_by_external_id(&self, external_id: &str) -> Result<bool>;

    // Sessions
    async fn find_session_by_external_id(&self, external_id: &str) -> Result<Option<Session>>;
    async fn upsert_session(&self, upsert: SessionUpsert) -> Result<Upserted<Session>>;
    /// Soft delete: sets status to cancelled. Returns false when no row matched.
    async fn cancel_session_by_external_id(&self, external_id: &str) -> Result<bool>;
    async fn completed_session_count(&self, client_id: &str) -> Result<i64>;
    /// Recomputes `mhcp_used_sessions` for every client of the practitioner
    /// from their completed-session counts. Returns the number of clients
    /// touched.
    async fn recompute_mhcp_used_sessions(&self, practitioner_id: &str) -> Result<usize>;

    // Audit log (append-only)
    async fn open_sync_log(&self, entry: NewSyncLogEntry) -> Result<String>;
    async fn finalize_sync_log(&self, id: &str, completion: SyncLogCompletion) -> Result<()>;
    async fn recent_sync_logs(&self, limit: i64) -> Result<Vec<SyncLogEntry>>;
}
