//! Shared application state handed to the HTTP handlers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use clinic_sync_core::remote::RemoteDirectory;
use clinic_sync_core::store::PracticeStore;
use clinic_sync_core::sync::SyncOrchestrator;
use clinic_sync_core::{RemoteError, Result};

pub struct AppState {
    pub orchestrator: Arc<SyncOrchestrator>,
    pub store: Arc<dyn PracticeStore>,
    pub webhook_secret: Option<String>,
}

/// Stand-in remote used when no platform credentials are configured. Webhook
/// paths that never reach out (cancellations, deactivations, updates to
/// already-mirrored entities) keep working; anything needing a fetch fails
/// with a clear error.
pub struct UnconfiguredRemote;

fn unconfigured() -> clinic_sync_core::Error {
    RemoteError::auth("remote practice platform is not configured").into()
}

#[async_trait]
impl RemoteDirectory for UnconfiguredRemote {
    async fn fetch_practitioner(&self, _external_id: &str) -> Result<Option<JsonValue>> {
        Err(unconfigured())
    }

    async fn fetch_patient(&self, _external_id: &str) -> Result<Option<JsonValue>> {
        Err(unconfigured())
    }

    async fn fetch_patients_for_practitioner(&self, _external_id: &str) -> Result<Vec<JsonValue>> {
        Err(unconfigured())
    }

    async fn fetch_appointments(
        &self,
        _practitioner_external_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _statuses: Option<&[&str]>,
    ) -> Result<Vec<JsonValue>> {
        Err(unconfigured())
    }
}
