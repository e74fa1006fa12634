use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value as JsonValue};

use crate::entities::{
    Client, ClientUpsert, Practitioner, PractitionerRef, PractitionerUpsert, Session,
    SessionStatus, SessionUpsert, Upserted,
};
use crate::remote::RemoteDirectory;
use crate::store::PracticeStore;
use crate::sync::log::{
    NewSyncLogEntry, SyncEntityKind, SyncLogCompletion, SyncLogEntry, SyncLogStatus, SyncType,
};
use crate::sync::orchestrator::SyncOrchestrator;
use crate::sync::reconciler::ScheduledReconciler;
use crate::transform::{AppointmentRefs, EntityTransformer};
use crate::{Error, Result};

#[derive(Default)]
struct StoreInner {
    practitioners: HashMap<String, Practitioner>,
    clients: HashMap<String, Client>,
    sessions: HashMap<String, Session>,
    logs: Vec<SyncLogEntry>,
    next_id: u32,
}

impl StoreInner {
    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// In-memory store with the same upsert semantics as the SQLite backend.
#[derive(Default)]
struct MockStore {
    inner: Mutex<StoreInner>,
}

impl MockStore {
    fn seed_client(&self, external_id: &str, practitioner_id: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.mint_id("cl");
        inner.clients.insert(
            external_id.to_string(),
            Client {
                id: id.clone(),
                external_id: external_id.to_string(),
                practitioner_id: practitioner_id.to_string(),
                first_name: "Seed".to_string(),
                last_name: "Client".to_string(),
                date_of_birth: None,
                email: None,
                phone: None,
                presenting_issues: None,
                mhcp_total_sessions: None,
                mhcp_used_sessions: 0,
                is_active: true,
                last_synced_at: Utc::now(),
            },
        );
        id
    }

    fn seed_practitioner(&self, external_id: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.mint_id("pr");
        inner.practitioners.insert(
            external_id.to_string(),
            Practitioner {
                id: id.clone(),
                external_id: external_id.to_string(),
                first_name: "Seed".to_string(),
                last_name: "Practitioner".to_string(),
                email: None,
                phone: None,
                specialty: None,
                is_active: true,
                last_synced_at: Utc::now(),
            },
        );
        id
    }

    fn seed_session(&self, external_id: &str, client_id: &str, number: i32, status: SessionStatus) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.mint_id("se");
        let now = Utc::now();
        inner.sessions.insert(
            external_id.to_string(),
            Session {
                id,
                external_id: external_id.to_string(),
                practitioner_id: "pr-seed".to_string(),
                client_id: client_id.to_string(),
                scheduled_start: now,
                scheduled_end: now + Duration::minutes(50),
                actual_start: None,
                actual_end: None,
                session_number: number,
                status,
                billing_code: None,
                fee_cents: None,
            },
        );
    }

    fn session(&self, external_id: &str) -> Option<Session> {
        self.inner.lock().unwrap().sessions.get(external_id).cloned()
    }

    fn client(&self, external_id: &str) -> Option<Client> {
        self.inner.lock().unwrap().clients.get(external_id).cloned()
    }

    fn logs(&self) -> Vec<SyncLogEntry> {
        self.inner.lock().unwrap().logs.clone()
    }
}

#[async_trait]
impl PracticeStore for MockStore {
    async fn find_practitioner_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Practitioner>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .practitioners
            .get(external_id)
            .cloned())
    }

    async fn upsert_practitioner(
        &self,
        upsert: PractitionerUpsert,
    ) -> Result<Upserted<Practitioner>> {
        let mut inner = self.inner.lock().unwrap();
        let created = !inner.practitioners.contains_key(&upsert.external_id);
        let id = if created {
            inner.mint_id("pr")
        } else {
            inner.practitioners[&upsert.external_id].id.clone()
        };
        let entity = Practitioner {
            id,
            external_id: upsert.external_id.clone(),
            first_name: upsert.first_name,
            last_name: upsert.last_name,
            email: upsert.email,
            phone: upsert.phone,
            specialty: upsert.specialty,
            is_active: upsert.is_active,
            last_synced_at: Utc::now(),
        };
        inner
            .practitioners
            .insert(upsert.external_id, entity.clone());
        Ok(Upserted { entity, created })
    }

    async fn active_practitioners(&self) -> Result<Vec<PractitionerRef>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .practitioners
            .values()
            .filter(|p| p.is_active)
            .map(|p| PractitionerRef {
                local_id: p.id.clone(),
                external_id: p.external_id.clone(),
            })
            .collect())
    }

    async fn find_client_by_external_id(&self, external_id: &str) -> Result<Option<Client>> {
        Ok(self.inner.lock().unwrap().clients.get(external_id).cloned())
    }

    async fn upsert_client(&self, upsert: ClientUpsert) -> Result<Upserted<Client>> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.clients.get(&upsert.external_id).cloned();
        let created = existing.is_none();
        let id = existing
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_else(|| inner.mint_id("cl"));
        let entity = Client {
            id,
            external_id: upsert.external_id.clone(),
            practitioner_id: upsert.practitioner_id,
            first_name: upsert.first_name,
            last_name: upsert.last_name,
            date_of_birth: upsert.date_of_birth,
            email: upsert.email,
            phone: upsert.phone,
            presenting_issues: upsert
                .presenting_issues
                .or_else(|| existing.as_ref().and_then(|c| c.presenting_issues.clone())),
            mhcp_total_sessions: upsert.mhcp_total_sessions,
            mhcp_used_sessions: existing.as_ref().map(|c| c.mhcp_used_sessions).unwrap_or(0),
            is_active: upsert.is_active,
            last_synced_at: Utc::now(),
        };
        inner.clients.insert(upsert.external_id, entity.clone());
        Ok(Upserted { entity, created })
    }

    async fn deactivate_client_by_external_id(&self, external_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.clients.get_mut(external_id) {
            Some(client) => {
                client.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_session_by_external_id(&self, external_id: &str) -> Result<Option<Session>> {
        Ok(self.inner.lock().unwrap().sessions.get(external_id).cloned())
    }

    async fn upsert_session(&self, upsert: SessionUpsert) -> Result<Upserted<Session>> {
        let mut inner = self.inner.lock().unwrap();
        let existing = inner.sessions.get(&upsert.external_id).cloned();
        let created = existing.is_none();
        let id = existing
            .as_ref()
            .map(|s| s.id.clone())
            .unwrap_or_else(|| inner.mint_id("se"));
        let entity = Session {
            id,
            external_id: upsert.external_id.clone(),
            practitioner_id: upsert.practitioner_id,
            client_id: upsert.client_id,
            scheduled_start: upsert.scheduled_start,
            scheduled_end: upsert.scheduled_end,
            actual_start: upsert.actual_start,
            actual_end: upsert.actual_end,
            session_number: existing
                .as_ref()
                .map(|s| s.session_number)
                .unwrap_or(upsert.session_number),
            status: upsert.status,
            billing_code: upsert.billing_code,
            fee_cents: upsert.fee_cents,
        };
        inner.sessions.insert(upsert.external_id, entity.clone());
        Ok(Upserted { entity, created })
    }

    async fn cancel_session_by_external_id(&self, external_id: &str) -> Result<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.sessions.get_mut(external_id) {
            Some(session) => {
                session.status = SessionStatus::Cancelled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn completed_session_count(&self, client_id: &str) -> Result<i64> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .sessions
            .values()
            .filter(|s| s.client_id == client_id && s.status.is_completed())
            .count() as i64)
    }

    async fn recompute_mhcp_used_sessions(&self, practitioner_id: &str) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap();
        let counts: HashMap<String, i32> = inner
            .clients
            .values()
            .filter(|c| c.practitioner_id == practitioner_id)
            .map(|c| {
                let used = inner
                    .sessions
                    .values()
                    .filter(|s| s.client_id == c.id && s.status.is_completed())
                    .count() as i32;
                (c.external_id.clone(), used)
            })
            .collect();
        let touched = counts.len();
        for (external_id, used) in counts {
            if let Some(client) = inner.clients.get_mut(&external_id) {
                client.mhcp_used_sessions = used;
            }
        }
        Ok(touched)
    }

    async fn open_sync_log(&self, entry: NewSyncLogEntry) -> Result<String> {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.mint_id("log");
        inner.logs.push(SyncLogEntry {
            id: id.clone(),
            sync_type: entry.sync_type,
            entity_kind: entry.entity_kind,
            status: SyncLogStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            records_processed: 0,
            error_message: None,
            practitioner_external_id: entry.practitioner_external_id,
        });
        Ok(id)
    }

    async fn finalize_sync_log(&self, id: &str, completion: SyncLogCompletion) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .logs
            .iter_mut()
            .find(|entry| entry.id == id)
            .expect("log entry exists");
        entry.status = completion.status;
        entry.records_processed = completion.records_processed;
        entry.error_message = completion.error_message;
        entry.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn recent_sync_logs(&self, limit: i64) -> Result<Vec<SyncLogEntry>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .logs
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

/// Canned remote directory serving flat JSON resources.
#[derive(Default)]
struct MockRemote {
    practitioners: HashMap<String, JsonValue>,
    patients: HashMap<String, JsonValue>,
    patients_by_practitioner: HashMap<String, Vec<JsonValue>>,
    appointments: HashMap<String, Vec<JsonValue>>,
    patient_fetches: Mutex<usize>,
}

impl MockRemote {
    fn with_practitioner(mut self, external_id: &str) -> Self {
        self.practitioners.insert(
            external_id.to_string(),
            json!({
                "id": external_id,
                "firstName": "Dana",
                "lastName": "Reeves",
                "email": "dana@example.net",
                "specialty": "Clinical Psychology",
            }),
        );
        self
    }

    fn with_patient(mut self, practitioner: &str, resource: JsonValue) -> Self {
        let id = resource["id"].as_str().unwrap().to_string();
        self.patients.insert(id, resource.clone());
        self.patients_by_practitioner
            .entry(practitioner.to_string())
            .or_default()
            .push(resource);
        self
    }

    fn with_appointment(mut self, practitioner: &str, resource: JsonValue) -> Self {
        self.appointments
            .entry(practitioner.to_string())
            .or_default()
            .push(resource);
        self
    }

    fn patient_fetches(&self) -> usize {
        *self.patient_fetches.lock().unwrap()
    }
}

#[async_trait]
impl RemoteDirectory for MockRemote {
    async fn fetch_practitioner(&self, external_id: &str) -> Result<Option<JsonValue>> {
        Ok(self.practitioners.get(external_id).cloned())
    }

    async fn fetch_patient(&self, external_id: &str) -> Result<Option<JsonValue>> {
        *self.patient_fetches.lock().unwrap() += 1;
        Ok(self.patients.get(external_id).cloned())
    }

    async fn fetch_patients_for_practitioner(&self, external_id: &str) -> Result<Vec<JsonValue>> {
        Ok(self
            .patients_by_practitioner
            .get(external_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_appointments(
        &self,
        practitioner_external_id: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _statuses: Option<&[&str]>,
    ) -> Result<Vec<JsonValue>> {
        Ok(self
            .appointments
            .get(practitioner_external_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Transformer over the flat test resources, with optional failure injection
/// keyed on a patient id.
#[derive(Default)]
struct FlatTransformer {
    fail_patient: Option<String>,
}

impl FlatTransformer {
    fn failing_on(patient_id: &str) -> Self {
        Self {
            fail_patient: Some(patient_id.to_string()),
        }
    }

    fn parse_status(&self, raw: &str) -> SessionStatus {
        match raw {
            "completed" => SessionStatus::Completed,
            "confirmed" => SessionStatus::Confirmed,
            "cancelled" => SessionStatus::Cancelled,
            "no_show" => SessionStatus::NoShow,
            _ => SessionStatus::Scheduled,
        }
    }

    fn parse_time(&self, resource: &JsonValue, field: &str) -> Result<DateTime<Utc>> {
        let raw = resource[field]
            .as_str()
            .ok_or_else(|| Error::transform(format!("missing {field}")))?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| Error::transform(format!("bad {field}: {err}")))
    }
}

impl EntityTransformer for FlatTransformer {
    fn practitioner_upsert(
        &self,
        resource: &JsonValue,
        _existing: Option<&Practitioner>,
    ) -> Result<PractitionerUpsert> {
        Ok(PractitionerUpsert {
            external_id: resource["id"].as_str().unwrap_or_default().to_string(),
            first_name: resource["firstName"].as_str().unwrap_or_default().to_string(),
            last_name: resource["lastName"].as_str().unwrap_or_default().to_string(),
            email: resource["email"].as_str().map(String::from),
            phone: resource["phone"].as_str().map(String::from),
            specialty: resource["specialty"].as_str().map(String::from),
            is_active: true,
        })
    }

    fn client_upsert(
        &self,
        resource: &JsonValue,
        practitioner_id: &str,
        _existing: Option<&Client>,
    ) -> Result<ClientUpsert> {
        let id = resource["id"].as_str().unwrap_or_default().to_string();
        if self.fail_patient.as_deref() == Some(id.as_str()) {
            return Err(Error::transform(format!("unmappable patient {id}")));
        }
        Ok(ClientUpsert {
            external_id: id,
            practitioner_id: practitioner_id.to_string(),
            first_name: resource["firstName"].as_str().unwrap_or_default().to_string(),
            last_name: resource["lastName"].as_str().unwrap_or_default().to_string(),
            date_of_birth: None,
            email: resource["email"].as_str().map(String::from),
            phone: resource["phone"].as_str().map(String::from),
            presenting_issues: resource["presentingIssues"].as_str().map(String::from),
            mhcp_total_sessions: resource["mhcpTotalSessions"]
                .as_i64()
                .map(|total| total as i32),
            is_active: true,
        })
    }

    fn session_upsert(
        &self,
        resource: &JsonValue,
        practitioner_id: &str,
        client_id: &str,
        session_number: i32,
        _existing: Option<&Session>,
    ) -> Result<SessionUpsert> {
        let status = self.parse_status(resource["status"].as_str().unwrap_or("scheduled"));
        let start = self.parse_time(resource, "start")?;
        let end = self.parse_time(resource, "end")?;
        Ok(SessionUpsert {
            external_id: resource["id"].as_str().unwrap_or_default().to_string(),
            practitioner_id: practitioner_id.to_string(),
            client_id: client_id.to_string(),
            scheduled_start: start,
            scheduled_end: end,
            actual_start: status.is_completed().then_some(start),
            actual_end: status.is_completed().then_some(end),
            session_number,
            status,
            billing_code: resource["billingCode"].as_str().map(String::from),
            fee_cents: resource["feeCents"].as_i64(),
        })
    }

    fn appointment_refs(&self, resource: &JsonValue) -> Result<AppointmentRefs> {
        Ok(AppointmentRefs {
            patient_external_id: resource["patientId"].as_str().map(String::from),
            practitioner_external_id: resource["practitionerId"].as_str().map(String::from),
        })
    }

    fn patient_practitioner_ref(&self, resource: &JsonValue) -> Option<String> {
        resource["practitionerId"].as_str().map(String::from)
    }

    fn resource_id(&self, resource: &JsonValue) -> Option<String> {
        resource["id"].as_str().map(String::from)
    }
}

fn patient(id: &str, first: &str) -> JsonValue {
    json!({
        "id": id,
        "firstName": first,
        "lastName": "Nguyen",
        "email": format!("{}@example.net", id.to_lowercase()),
        "mhcpTotalSessions": 10,
    })
}

fn appointment(id: &str, patient_id: &str, practitioner_id: &str, status: &str) -> JsonValue {
    json!({
        "id": id,
        "patientId": patient_id,
        "practitionerId": practitioner_id,
        "start": "2026-08-20T09:00:00Z",
        "end": "2026-08-20T09:50:00Z",
        "status": status,
        "billingCode": "80110",
        "feeCents": 22_000,
    })
}

fn orchestrator(
    store: Arc<MockStore>,
    remote: Arc<MockRemote>,
    transformer: FlatTransformer,
) -> SyncOrchestrator {
    SyncOrchestrator::new(store, remote, Arc::new(transformer))
}

#[tokio::test]
async fn full_sync_mirrors_everything_on_first_run() {
    let store = Arc::new(MockStore::default());
    let remote = Arc::new(
        MockRemote::default()
            .with_practitioner("PR1")
            .with_patient("PR1", patient("P1", "Alma"))
            .with_patient("PR1", patient("P2", "Bao"))
            .with_appointment("PR1", appointment("A1", "P1", "PR1", "completed"))
            .with_appointment("PR1", appointment("A2", "P1", "PR1", "booked"))
            .with_appointment("PR1", appointment("A3", "P2", "PR1", "completed")),
    );
    let sync = orchestrator(store.clone(), remote, FlatTransformer::default());

    let outcome = sync.full_sync("PR1").await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.records_created, 6);
    assert_eq!(outcome.records_updated, 0);
    assert_eq!(store.session("A1").unwrap().session_number, 1);
    assert_eq!(store.session("A2").unwrap().session_number, 2);
    assert_eq!(store.session("A3").unwrap().session_number, 1);
    // Derived usage reflects completed sessions only.
    assert_eq!(store.client("P1").unwrap().mhcp_used_sessions, 1);
    assert_eq!(store.client("P2").unwrap().mhcp_used_sessions, 1);
    assert_eq!(store.client("P1").unwrap().mhcp_total_sessions, Some(10));
}

#[tokio::test]
async fn full_sync_second_run_updates_without_renumbering() {
    let store = Arc::new(MockStore::default());
    let remote = Arc::new(
        MockRemote::default()
            .with_practitioner("PR1")
            .with_patient("PR1", patient("P1", "Alma"))
            .with_appointment("PR1", appointment("A1", "P1", "PR1", "completed"))
            .with_appointment("PR1", appointment("A2", "P1", "PR1", "booked")),
    );
    let sync = orchestrator(store.clone(), remote, FlatTransformer::default());

    let first = sync.full_sync("PR1").await;
    let second = sync.full_sync("PR1").await;

    assert_eq!(first.records_created, 4);
    assert_eq!(second.records_created, 0);
    assert_eq!(second.records_updated, 4);
    assert_eq!(store.session("A1").unwrap().session_number, 1);
    assert_eq!(store.session("A2").unwrap().session_number, 2);
}

#[tokio::test]
async fn full_sync_numbers_new_sessions_after_history() {
    let store = Arc::new(MockStore::default());
    let practitioner_id = store.seed_practitioner("PR1");
    let client_id = store.seed_client("P1", &practitioner_id);
    for n in 1..=3 {
        store.seed_session(&format!("H{n}"), &client_id, n, SessionStatus::Completed);
    }
    let remote = Arc::new(
        MockRemote::default()
            .with_practitioner("PR1")
            .with_patient("PR1", patient("P1", "Alma"))
            .with_appointment("PR1", appointment("A9", "P1", "PR1", "booked")),
    );
    let sync = orchestrator(store.clone(), remote, FlatTransformer::default());

    let outcome = sync.full_sync("PR1").await;

    assert!(outcome.success);
    assert_eq!(store.session("A9").unwrap().session_number, 4);
}

#[tokio::test]
async fn one_bad_patient_does_not_stop_the_rest() {
    let store = Arc::new(MockStore::default());
    let mut remote = MockRemote::default().with_practitioner("PR1");
    for (id, first) in [("P1", "Alma"), ("P2", "Bao"), ("P3", "Cleo"), ("P4", "Dev"), ("P5", "Ena")]
    {
        remote = remote.with_patient("PR1", patient(id, first));
    }
    let sync = orchestrator(
        store.clone(),
        Arc::new(remote),
        FlatTransformer::failing_on("P3"),
    );

    let outcome = sync.full_sync("PR1").await;

    assert!(!outcome.success);
    assert_eq!(outcome.records_created, 5); // practitioner + 4 patients
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].entity_id, "P3");
    assert!(store.client("P3").is_none());
    assert!(store.client("P4").is_some());

    let logs = store.logs();
    assert_eq!(logs[0].status, SyncLogStatus::Error);
    assert!(logs[0].error_message.as_deref().unwrap().contains("P3"));
}

#[tokio::test]
async fn unknown_practitioner_is_fatal() {
    let store = Arc::new(MockStore::default());
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync.full_sync("PR404").await;

    assert!(!outcome.success);
    assert_eq!(outcome.records_processed(), 0);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(store.logs()[0].status, SyncLogStatus::Error);
}

#[tokio::test]
async fn appointment_for_unknown_patient_is_skipped_silently() {
    let store = Arc::new(MockStore::default());
    let remote = Arc::new(
        MockRemote::default()
            .with_practitioner("PR1")
            .with_patient("PR1", patient("P1", "Alma"))
            .with_appointment("PR1", appointment("A1", "P9", "PR1", "booked")),
    );
    let sync = orchestrator(store.clone(), remote, FlatTransformer::default());

    let outcome = sync.full_sync("PR1").await;

    assert!(outcome.success);
    assert_eq!(outcome.records_created, 2); // practitioner + P1 only
    assert!(store.session("A1").is_none());
}

#[tokio::test]
async fn incremental_appointment_numbers_after_completed_history() {
    let store = Arc::new(MockStore::default());
    let practitioner_id = store.seed_practitioner("PR1");
    let client_id = store.seed_client("P1", &practitioner_id);
    store.seed_session("H1", &client_id, 1, SessionStatus::Completed);
    store.seed_session("H2", &client_id, 2, SessionStatus::Completed);
    store.seed_session("H3", &client_id, 3, SessionStatus::Cancelled);
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync
        .incremental_sync(
            "appointment.created",
            &appointment("A1", "P1", "PR1", "booked"),
        )
        .await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.records_created, 1);
    // Two completed sessions, so the new one is number 3; the cancelled row
    // does not count.
    assert_eq!(store.session("A1").unwrap().session_number, 3);
}

#[tokio::test]
async fn incremental_appointment_update_keeps_assigned_number() {
    let store = Arc::new(MockStore::default());
    let practitioner_id = store.seed_practitioner("PR1");
    let client_id = store.seed_client("P1", &practitioner_id);
    store.seed_session("A1", &client_id, 7, SessionStatus::Scheduled);
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync
        .incremental_sync(
            "appointment.updated",
            &appointment("A1", "P1", "PR1", "completed"),
        )
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.records_updated, 1);
    let session = store.session("A1").unwrap();
    assert_eq!(session.session_number, 7);
    assert_eq!(session.status, SessionStatus::Completed);
}

#[tokio::test]
async fn incremental_appointment_auto_provisions_missing_patient() {
    let store = Arc::new(MockStore::default());
    store.seed_practitioner("PR1");
    let remote = Arc::new(
        MockRemote::default()
            .with_practitioner("PR1")
            .with_patient("PR1", patient("P1", "Alma")),
    );
    let sync = orchestrator(store.clone(), remote.clone(), FlatTransformer::default());

    let outcome = sync
        .incremental_sync(
            "appointment.created",
            &appointment("A1", "P1", "PR1", "booked"),
        )
        .await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.records_created, 2); // client + session
    assert_eq!(remote.patient_fetches(), 1);
    assert!(store.client("P1").is_some());
    assert!(store.session("A1").is_some());
}

#[tokio::test]
async fn cancel_event_soft_deletes_the_session() {
    let store = Arc::new(MockStore::default());
    let practitioner_id = store.seed_practitioner("PR1");
    let client_id = store.seed_client("P1", &practitioner_id);
    store.seed_session("A1", &client_id, 1, SessionStatus::Scheduled);
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync
        .incremental_sync("appointment.cancelled", &json!({"id": "A1"}))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.records_deleted, 1);
    assert_eq!(store.session("A1").unwrap().status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn cancel_event_for_unknown_session_is_a_successful_noop() {
    let store = Arc::new(MockStore::default());
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync
        .incremental_sync("appointment.deleted", &json!({"id": "A404"}))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.records_processed(), 0);
    assert_eq!(store.logs()[0].status, SyncLogStatus::Success);
}

#[tokio::test]
async fn patient_delete_deactivates_the_client() {
    let store = Arc::new(MockStore::default());
    let practitioner_id = store.seed_practitioner("PR1");
    store.seed_client("P1", &practitioner_id);
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync
        .incremental_sync("patient.deleted", &json!({"id": "P1"}))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.records_deleted, 1);
    assert!(!store.client("P1").unwrap().is_active);
}

#[tokio::test]
async fn new_patient_event_resolves_practitioner_from_resource() {
    let store = Arc::new(MockStore::default());
    let practitioner_id = store.seed_practitioner("PR1");
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let mut resource = patient("P1", "Alma");
    resource["practitionerId"] = json!("PR1");
    let outcome = sync.incremental_sync("patient.created", &resource).await;

    assert!(outcome.success, "errors: {:?}", outcome.errors);
    assert_eq!(outcome.records_created, 1);
    assert_eq!(store.client("P1").unwrap().practitioner_id, practitioner_id);
}

#[tokio::test]
async fn patient_event_without_resolvable_practitioner_fails() {
    let store = Arc::new(MockStore::default());
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync
        .incremental_sync("patient.created", &patient("P1", "Alma"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.errors.len(), 1);
    assert!(store.client("P1").is_none());
    assert_eq!(store.logs()[0].status, SyncLogStatus::Error);
}

#[tokio::test]
async fn patient_update_preserves_local_presenting_issues() {
    let store = Arc::new(MockStore::default());
    let practitioner_id = store.seed_practitioner("PR1");
    store.seed_client("P1", &practitioner_id);
    {
        let mut inner = store.inner.lock().unwrap();
        inner.clients.get_mut("P1").unwrap().presenting_issues =
            Some("generalized anxiety".to_string());
    }
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    // The update carries no presentingIssues field.
    let outcome = sync
        .incremental_sync("patient.updated", &patient("P1", "Alma"))
        .await;

    assert!(outcome.success);
    let client = store.client("P1").unwrap();
    assert_eq!(client.first_name, "Alma");
    assert_eq!(
        client.presenting_issues.as_deref(),
        Some("generalized anxiety")
    );
}

#[tokio::test]
async fn practitioner_update_refetches_from_remote() {
    let store = Arc::new(MockStore::default());
    store.seed_practitioner("PR1");
    let remote = Arc::new(MockRemote::default().with_practitioner("PR1"));
    let sync = orchestrator(store.clone(), remote, FlatTransformer::default());

    let outcome = sync
        .incremental_sync("practitioner.updated", &json!({"id": "PR1"}))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.records_updated, 1);
    let inner = store.inner.lock().unwrap();
    assert_eq!(inner.practitioners["PR1"].first_name, "Dana");
}

#[tokio::test]
async fn unrecognized_event_is_logged_and_ignored() {
    let store = Arc::new(MockStore::default());
    let sync = orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    );

    let outcome = sync
        .incremental_sync("invoice.created", &json!({"id": "I1"}))
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.records_processed(), 0);
    let logs = store.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].entity_kind, SyncEntityKind::All);
    assert_eq!(logs[0].status, SyncLogStatus::Success);
}

#[tokio::test]
async fn full_sync_log_entry_records_the_run() {
    let store = Arc::new(MockStore::default());
    let remote = Arc::new(
        MockRemote::default()
            .with_practitioner("PR1")
            .with_patient("PR1", patient("P1", "Alma")),
    );
    let sync = orchestrator(store.clone(), remote, FlatTransformer::default());

    let outcome = sync.full_sync("PR1").await;

    let logs = store.logs();
    assert_eq!(logs.len(), 1);
    let entry = &logs[0];
    assert_eq!(entry.sync_type, SyncType::Full);
    assert_eq!(entry.entity_kind, SyncEntityKind::All);
    assert_eq!(entry.status, SyncLogStatus::Success);
    assert_eq!(entry.records_processed as usize, outcome.records_processed());
    assert_eq!(entry.practitioner_external_id.as_deref(), Some("PR1"));
    assert!(entry.completed_at.is_some());
}

#[tokio::test]
async fn reconciler_isolates_practitioner_failures() {
    let store = Arc::new(MockStore::default());
    store.seed_practitioner("PR1");
    store.seed_practitioner("PR2");
    // Only PR2 exists remotely, so PR1's pass fails.
    let remote = Arc::new(MockRemote::default().with_practitioner("PR2"));
    let sync = Arc::new(orchestrator(
        store.clone(),
        remote,
        FlatTransformer::default(),
    ));
    let reconciler = ScheduledReconciler::new(store.clone(), sync, true);

    let report = reconciler.run_once().await;

    assert!(!report.skipped);
    assert_eq!(report.practitioners_synced, 1);
    assert_eq!(report.practitioners_failed, 1);
}

#[tokio::test]
async fn disabled_reconciler_skips_the_pass() {
    let store = Arc::new(MockStore::default());
    store.seed_practitioner("PR1");
    let sync = Arc::new(orchestrator(
        store.clone(),
        Arc::new(MockRemote::default()),
        FlatTransformer::default(),
    ));
    let reconciler = ScheduledReconciler::new(store.clone(), sync, false);

    let report = reconciler.run_once().await;

    assert!(report.skipped);
    assert_eq!(report.practitioners_synced, 0);
    assert!(store.logs().is_empty());
}
