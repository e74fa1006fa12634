//! Reconciliation orchestrator: full sync and webhook-driven incremental sync.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use log::{debug, error, info, warn};
use serde_json::Value as JsonValue;

use crate::entities::{Client, Practitioner, Upserted};
use crate::remote::RemoteDirectory;
use crate::store::PracticeStore;
use crate::sync::events::WebhookEvent;
use crate::sync::log::{NewSyncLogEntry, SyncEntityKind, SyncLogCompletion, SyncLogStatus, SyncType};
use crate::sync::result::{SyncError, SyncOperation, SyncOutcome};
use crate::transform::EntityTransformer;
use crate::{Error, Result};

/// Appointment fetch window for a full sync, relative to now.
pub const APPOINTMENT_LOOKBACK_DAYS: i64 = 30;
pub const APPOINTMENT_LOOKAHEAD_DAYS: i64 = 90;

/// Running counters for one sync call.
#[derive(Debug, Default)]
struct Tally {
    created: usize,
    updated: usize,
    deleted: usize,
    errors: Vec<SyncError>,
}

impl Tally {
    fn count_upsert(&mut self, created: bool) {
        if created {
            self.created += 1;
        } else {
            self.updated += 1;
        }
    }

    fn record_error(
        &mut self,
        entity_kind: SyncEntityKind,
        entity_id: &str,
        operation: SyncOperation,
        err: &Error,
    ) {
        warn!(
            "[Sync] {:?} {} failed during {:?}: {}",
            entity_kind, entity_id, operation, err
        );
        self.errors
            .push(SyncError::new(entity_kind, entity_id, operation, err.to_string()));
    }

    fn records_processed(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    fn into_outcome(self, started: Instant) -> SyncOutcome {
        SyncOutcome {
            success: self.errors.is_empty(),
            records_created: self.created,
            records_updated: self.updated,
            records_deleted: self.deleted,
            errors: self.errors,
            duration_ms: started.elapsed().as_millis() as i64,
        }
    }
}

/// Owns reconciliation logic for the mirror. Explicitly constructed with its
/// collaborators; hosts hold one instance per process and share it across the
/// webhook and scheduled entry points.
pub struct SyncOrchestrator {
    store: Arc<dyn PracticeStore>,
    remote: Arc<dyn RemoteDirectory>,
    transformer: Arc<dyn EntityTransformer>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn PracticeStore>,
        remote: Arc<dyn RemoteDirectory>,
        transformer: Arc<dyn EntityTransformer>,
    ) -> Self {
        Self {
            store,
            remote,
            transformer,
        }
    }

    /// Complete re-fetch-and-upsert pass over one practitioner's data.
    ///
    /// Per-entity failures are collected and do not stop remaining work; the
    /// single fatal path is the practitioner itself being unknown to the
    /// remote platform. The returned outcome mirrors the finalized log entry.
    pub async fn full_sync(&self, practitioner_external_id: &str) -> SyncOutcome {
        let started = Instant::now();
        info!("[Sync] Full sync starting for practitioner {}", practitioner_external_id);

        let log_id = match self
            .store
            .open_sync_log(NewSyncLogEntry {
                sync_type: SyncType::Full,
                entity_kind: SyncEntityKind::All,
                practitioner_external_id: Some(practitioner_external_id.to_string()),
            })
            .await
        {
            Ok(id) => id,
            Err(err) => {
                error!("[Sync] Could not open sync log: {}", err);
                let mut tally = Tally::default();
                tally.record_error(
                    SyncEntityKind::All,
                    practitioner_external_id,
                    SyncOperation::Create,
                    &err,
                );
                return tally.into_outcome(started);
            }
        };

        let mut tally = Tally::default();
        if let Err(err) = self
            .run_full_sync(practitioner_external_id, &mut tally)
            .await
        {
            // Fatal-setup failure: abort the run and surface it as the run's
            // single reported error alongside anything collected so far.
            tally.record_error(
                SyncEntityKind::Practitioner,
                practitioner_external_id,
                SyncOperation::Fetch,
                &err,
            );
        }

        self.finalize_log(&log_id, &tally).await;
        let outcome = tally.into_outcome(started);
        info!(
            "[Sync] Full sync for {} finished: success={} created={} updated={} errors={} ({} ms)",
            practitioner_external_id,
            outcome.success,
            outcome.records_created,
            outcome.records_updated,
            outcome.errors.len(),
            outcome.duration_ms
        );
        outcome
    }

    async fn run_full_sync(&self, external_id: &str, tally: &mut Tally) -> Result<()> {
        // Practitioner first; nothing else can be attributed without it.
        let resource = self
            .remote
            .fetch_practitioner(external_id)
            .await?
            .ok_or_else(|| {
                Error::validation(format!(
                    "practitioner {} not found on remote platform",
                    external_id
                ))
            })?;
        let existing = self.store.find_practitioner_by_external_id(external_id).await?;
        let upsert = self
            .transformer
            .practitioner_upsert(&resource, existing.as_ref())?;
        let practitioner = self.store.upsert_practitioner(upsert).await?;
        tally.count_upsert(practitioner.created);
        let practitioner = practitioner.entity;

        // Patients, each caught individually. The external->local id map is
        // the resolution table for the appointment pass below.
        let patients = self
            .remote
            .fetch_patients_for_practitioner(external_id)
            .await?;
        let mut client_ids: HashMap<String, String> = HashMap::new();
        for resource in &patients {
            let remote_id = self
                .transformer
                .resource_id(resource)
                .unwrap_or_else(|| "<unknown>".to_string());
            match self.upsert_client_from(resource, &practitioner.id).await {
                Ok(upserted) => {
                    tally.count_upsert(upserted.created);
                    client_ids.insert(upserted.entity.external_id.clone(), upserted.entity.id);
                }
                Err(err) => {
                    tally.record_error(SyncEntityKind::Client, &remote_id, SyncOperation::Create, &err)
                }
            }
        }

        // Appointments in [today-30d, today+90d). Session counters are seeded
        // once per client from the existing completed count, then incremented
        // per appointment; an existing row keeps its stored number.
        let now = Utc::now();
        let start = now - Duration::days(APPOINTMENT_LOOKBACK_DAYS);
        let end = now + Duration::days(APPOINTMENT_LOOKAHEAD_DAYS);
        let appointments = self
            .remote
            .fetch_appointments(external_id, start, end, None)
            .await?;
        let mut session_counters: HashMap<String, i64> = HashMap::new();
        for resource in &appointments {
            let remote_id = self
                .transformer
                .resource_id(resource)
                .unwrap_or_else(|| "<unknown>".to_string());
            if let Err(err) = self
                .sync_one_appointment(
                    resource,
                    &remote_id,
                    &practitioner.id,
                    &client_ids,
                    &mut session_counters,
                    tally,
                )
                .await
            {
                tally.record_error(SyncEntityKind::Session, &remote_id, SyncOperation::Create, &err);
            }
        }

        // Derived counters are recomputed after any full pass so that
        // mhcp_used_sessions always equals the completed-session count.
        if let Err(err) = self
            .store
            .recompute_mhcp_used_sessions(&practitioner.id)
            .await
        {
            tally.record_error(
                SyncEntityKind::Client,
                &practitioner.id,
                SyncOperation::Update,
                &err,
            );
        }

        Ok(())
    }

    async fn sync_one_appointment(
        &self,
        resource: &JsonValue,
        remote_id: &str,
        practitioner_id: &str,
        client_ids: &HashMap<String, String>,
        session_counters: &mut HashMap<String, i64>,
        tally: &mut Tally,
    ) -> Result<()> {
        let refs = self.transformer.appointment_refs(resource)?;
        let Some(patient_external_id) = refs.patient_external_id else {
            warn!("[Sync] Appointment {} names no patient; skipping", remote_id);
            return Ok(());
        };
        let Some(client_id) = client_ids.get(&patient_external_id) else {
            warn!(
                "[Sync] Appointment {} references patient {} not in this run; skipping",
                remote_id, patient_external_id
            );
            return Ok(());
        };

        let counter = match session_counters.entry(client_id.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let seed = self.store.completed_session_count(client_id).await?;
                entry.insert(seed)
            }
        };
        *counter += 1;

        let existing = self.store.find_session_by_external_id(remote_id).await?;
        let session_number = existing
            .as_ref()
            .map(|session| session.session_number)
            .unwrap_or(*counter as i32);
        let upsert = self.transformer.session_upsert(
            resource,
            practitioner_id,
            client_id,
            session_number,
            existing.as_ref(),
        )?;
        let upserted = self.store.upsert_session(upsert).await?;
        tally.count_upsert(upserted.created);
        Ok(())
    }

    /// Applies one webhook-delivered change. Dispatch runs over the closed
    /// event enum; any failure anywhere in the dispatch aborts the call and
    /// is recorded as the call's single error.
    pub async fn incremental_sync(&self, event_name: &str, resource: &JsonValue) -> SyncOutcome {
        let started = Instant::now();
        let event = WebhookEvent::parse(event_name);
        debug!("[Sync] Incremental sync for event {}", event.as_str());

        let log_id = match self
            .store
            .open_sync_log(NewSyncLogEntry {
                sync_type: SyncType::Webhook,
                entity_kind: event.entity_kind(),
                practitioner_external_id: None,
            })
            .await
        {
            Ok(id) => id,
            Err(err) => {
                error!("[Sync] Could not open sync log: {}", err);
                let mut tally = Tally::default();
                tally.record_error(event.entity_kind(), event.as_str(), SyncOperation::Create, &err);
                return tally.into_outcome(started);
            }
        };

        let mut tally = Tally::default();
        if let Err(err) = self.dispatch_event(&event, resource, &mut tally).await {
            let entity_id = self
                .transformer
                .resource_id(resource)
                .unwrap_or_else(|| event.as_str().to_string());
            tally.record_error(event.entity_kind(), &entity_id, SyncOperation::Update, &err);
        }

        self.finalize_log(&log_id, &tally).await;
        tally.into_outcome(started)
    }

    async fn dispatch_event(
        &self,
        event: &WebhookEvent,
        resource: &JsonValue,
        tally: &mut Tally,
    ) -> Result<()> {
        match event {
            WebhookEvent::AppointmentCreated | WebhookEvent::AppointmentUpdated => {
                self.apply_appointment_change(resource, tally).await
            }
            WebhookEvent::AppointmentCancelled | WebhookEvent::AppointmentDeleted => {
                let external_id = self.require_resource_id(resource)?;
                if self.store.cancel_session_by_external_id(&external_id).await? {
                    tally.deleted += 1;
                } else {
                    debug!("[Sync] Cancel for unknown session {}; nothing to do", external_id);
                }
                Ok(())
            }
            WebhookEvent::PatientCreated | WebhookEvent::PatientUpdated => {
                self.apply_patient_change(resource, tally).await
            }
            WebhookEvent::PatientDeleted => {
                let external_id = self.require_resource_id(resource)?;
                if self
                    .store
                    .deactivate_client_by_external_id(&external_id)
                    .await?
                {
                    tally.deleted += 1;
                } else {
                    debug!("[Sync] Delete for unknown patient {}; nothing to do", external_id);
                }
                Ok(())
            }
            WebhookEvent::PractitionerUpdated => {
                let external_id = self.require_resource_id(resource)?;
                let upserted = self.refetch_practitioner(&external_id).await?;
                tally.count_upsert(upserted.created);
                Ok(())
            }
            WebhookEvent::Unrecognized(name) => {
                info!("[Sync] Ignoring unrecognized webhook event {}", name);
                Ok(())
            }
        }
    }

    async fn apply_appointment_change(
        &self,
        resource: &JsonValue,
        tally: &mut Tally,
    ) -> Result<()> {
        let external_id = self.require_resource_id(resource)?;
        let refs = self.transformer.appointment_refs(resource)?;
        let practitioner_external_id = refs.practitioner_external_id.ok_or_else(|| {
            Error::validation(format!("appointment {} names no practitioner", external_id))
        })?;
        let patient_external_id = refs.patient_external_id.ok_or_else(|| {
            Error::validation(format!("appointment {} names no patient", external_id))
        })?;

        // Self-healing: a webhook may arrive for entities a full sync has not
        // mirrored yet. Fetch and upsert the minimal missing pieces, then
        // proceed as if they had been there all along.
        let practitioner = match self
            .store
            .find_practitioner_by_external_id(&practitioner_external_id)
            .await?
        {
            Some(practitioner) => practitioner,
            None => {
                info!(
                    "[Sync] Auto-provisioning practitioner {} for appointment {}",
                    practitioner_external_id, external_id
                );
                let upserted = self.refetch_practitioner(&practitioner_external_id).await?;
                tally.count_upsert(upserted.created);
                upserted.entity
            }
        };

        let client = match self
            .store
            .find_client_by_external_id(&patient_external_id)
            .await?
        {
            Some(client) => client,
            None => {
                info!(
                    "[Sync] Auto-provisioning patient {} for appointment {}",
                    patient_external_id, external_id
                );
                let upserted = self
                    .refetch_patient(&patient_external_id, &practitioner.id)
                    .await?;
                tally.count_upsert(upserted.created);
                upserted.entity
            }
        };

        let completed = self.store.completed_session_count(&client.id).await?;
        let existing = self.store.find_session_by_external_id(&external_id).await?;
        let session_number = existing
            .as_ref()
            .map(|session| session.session_number)
            .unwrap_or(completed as i32 + 1);
        let upsert = self.transformer.session_upsert(
            resource,
            &practitioner.id,
            &client.id,
            session_number,
            existing.as_ref(),
        )?;
        let upserted = self.store.upsert_session(upsert).await?;
        tally.count_upsert(upserted.created);
        Ok(())
    }

    async fn apply_patient_change(&self, resource: &JsonValue, tally: &mut Tally) -> Result<()> {
        let external_id = self.require_resource_id(resource)?;

        // Owning practitioner comes from the existing client row; a new
        // patient falls back to the practitioner its resource names.
        let practitioner_id = match self.store.find_client_by_external_id(&external_id).await? {
            Some(client) => client.practitioner_id,
            None => {
                let practitioner_external_id = self
                    .transformer
                    .patient_practitioner_ref(resource)
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "cannot resolve a practitioner for patient {}",
                            external_id
                        ))
                    })?;
                self.store
                    .find_practitioner_by_external_id(&practitioner_external_id)
                    .await?
                    .ok_or_else(|| {
                        Error::validation(format!(
                            "practitioner {} for patient {} is not mirrored locally",
                            practitioner_external_id, external_id
                        ))
                    })?
                    .id
            }
        };

        let upserted = self.upsert_client_from(resource, &practitioner_id).await?;
        tally.count_upsert(upserted.created);
        Ok(())
    }

    async fn upsert_client_from(
        &self,
        resource: &JsonValue,
        practitioner_id: &str,
    ) -> Result<Upserted<Client>> {
        let external_id = self.require_resource_id(resource)?;
        let existing = self.store.find_client_by_external_id(&external_id).await?;
        let upsert = self
            .transformer
            .client_upsert(resource, practitioner_id, existing.as_ref())?;
        self.store.upsert_client(upsert).await
    }

    async fn refetch_practitioner(&self, external_id: &str) -> Result<Upserted<Practitioner>> {
        let resource = self
            .remote
            .fetch_practitioner(external_id)
            .await?
            .ok_or_else(|| {
                Error::validation(format!(
                    "practitioner {} not found on remote platform",
                    external_id
                ))
            })?;
        let existing = self.store.find_practitioner_by_external_id(external_id).await?;
        let upsert = self
            .transformer
            .practitioner_upsert(&resource, existing.as_ref())?;
        self.store.upsert_practitioner(upsert).await
    }

    async fn refetch_patient(
        &self,
        external_id: &str,
        practitioner_id: &str,
    ) -> Result<Upserted<Client>> {
        let resource = self
            .remote
            .fetch_patient(external_id)
            .await?
            .ok_or_else(|| {
                Error::validation(format!("patient {} not found on remote platform", external_id))
            })?;
        self.upsert_client_from(&resource, practitioner_id).await
    }

    fn require_resource_id(&self, resource: &JsonValue) -> Result<String> {
        self.transformer
            .resource_id(resource)
            .ok_or_else(|| Error::validation("resource carries no id"))
    }

    async fn finalize_log(&self, log_id: &str, tally: &Tally) {
        let status = if tally.errors.is_empty() {
            SyncLogStatus::Success
        } else {
            SyncLogStatus::Error
        };
        let error_message = if tally.errors.is_empty() {
            None
        } else {
            Some(
                tally
                    .errors
                    .iter()
                    .map(|err| err.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
        let completion = SyncLogCompletion {
            status,
            records_processed: tally.records_processed() as i32,
            error_message,
        };
        if let Err(err) = self.store.finalize_sync_log(log_id, completion).await {
            error!("[Sync] Could not finalize sync log {}: {}", log_id, err);
        }
    }
}
