//! Mapping contract between remote resources and local entities.

use serde_json::Value as JsonValue;

use crate::entities::{Client, ClientUpsert, Practitioner, PractitionerUpsert, Session, SessionUpsert};
use crate::Result;

/// Cross-entity references extracted from an appointment resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentRefs {
    pub patient_external_id: Option<String>,
    pub practitioner_external_id: Option<String>,
}

/// Pure mapping from a remote resource (plus the existing local row, when one
/// exists) to the local write model, and extraction of cross-entity
/// references. Implementations must not perform I/O.
pub trait EntityTransformer: Send + Sync {
    fn practitioner_upsert(
        &self,
        resource: &JsonValue,
        existing: Option<&Practitioner>,
    ) -> Result<PractitionerUpsert>;

    fn client_upsert(
        &self,
        resource: &JsonValue,
        practitioner_id: &str,
        existing: Option<&Client>,
    ) -> Result<ClientUpsert>;

    /// `session_number` is the number to assign if the session is new; the
    /// store keeps the existing number on update.
    fn session_upsert(
        &self,
        resource: &JsonValue,
        practitioner_id: &str,
        client_id: &str,
        session_number: i32,
        existing: Option<&Session>,
    ) -> Result<SessionUpsert>;

    /// Patient and practitioner references named by an appointment resource.
    fn appointment_refs(&self, resource: &JsonValue) -> Result<AppointmentRefs>;

    /// External id of the practitioner a patient resource names as its own,
    /// if any.
    fn patient_practitioner_ref(&self, resource: &JsonValue) -> Option<String>;

    /// External id of the resource itself.
    fn resource_id(&self, resource: &JsonValue) -> Option<String>;
}
