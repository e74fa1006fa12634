//! Remote platform read contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::Result;

/// Authenticated, read-only view of the remote platform's resources.
///
/// Resources are surfaced as raw JSON; the remote shape is consumed as given
/// and interpreted by the [`EntityTransformer`](crate::transform::EntityTransformer).
/// Implementations own pagination, rate limiting and auth retry; callers see
/// fully accumulated result sets. No local persistence side effects.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    /// Fetch one practitioner by external id. `None` when the remote platform
    /// reports it missing.
    async fn fetch_practitioner(&self, external_id: &str) -> Result<Option<JsonValue>>;

    /// Fetch one patient by external id. Used by the webhook path to
    /// auto-provision a client the engine has not seen yet.
    async fn fetch_patient(&self, external_id: &str) -> Result<Option<JsonValue>>;

    /// Fetch every patient belonging to the practitioner.
    async fn fetch_patients_for_practitioner(&self, external_id: &str) -> Result<Vec<JsonValue>>;

    /// Fetch appointments for the practitioner in the half-open range
    /// `[start, end)`, optionally filtered server-side by status.
    async fn fetch_appointments(
        &self,
        practitioner_external_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: Option<&[&str]>,
    ) -> Result<Vec<JsonValue>>;
}
