//! FHIR bundle navigation and resource-to-entity mapping.

use chrono::{DateTime, NaiveDate, Utc};
use log::warn;
use serde_json::Value as JsonValue;

use clinic_sync_core::entities::{
    Client, ClientUpsert, Practitioner, PractitionerUpsert, Session, SessionStatus, SessionUpsert,
};
use clinic_sync_core::transform::{AppointmentRefs, EntityTransformer};
use clinic_sync_core::{Error, Result};

/// Extension URLs carrying practice-specific fields on Patient and
/// Appointment resources.
const EXT_PRESENTING_ISSUES: &str = "urn:clinic-sync:presenting-issues";
const EXT_MHCP_TOTAL_SESSIONS: &str = "urn:clinic-sync:mhcp-total-sessions";
const EXT_FEE_CENTS: &str = "urn:clinic-sync:fee-cents";

/// Resources carried by a search bundle's entries.
pub fn bundle_resources(bundle: &JsonValue) -> Vec<JsonValue> {
    let mut resources = Vec::new();
    if let Some(entries) = bundle["entry"].as_array() {
        for entry in entries {
            let resource = &entry["resource"];
            if !resource.is_null() {
                resources.push(resource.clone());
            }
        }
    }
    resources
}

/// URL of the bundle's `next` page link, if one is present.
pub fn next_link(bundle: &JsonValue) -> Option<String> {
    bundle["link"].as_array()?.iter().find_map(|link| {
        if link["relation"].as_str() == Some("next") {
            link["url"].as_str().map(String::from)
        } else {
            None
        }
    })
}

fn reference_id<'a>(reference: &'a str, resource_type: &str) -> Option<&'a str> {
    reference
        .strip_prefix(resource_type)
        .and_then(|rest| rest.strip_prefix('/'))
}

fn human_name(resource: &JsonValue) -> (String, String) {
    let name = &resource["name"][0];
    let first = name["given"][0].as_str().unwrap_or_default().to_string();
    let last = name["family"].as_str().unwrap_or_default().to_string();
    (first, last)
}

fn telecom_value(resource: &JsonValue, system: &str) -> Option<String> {
    resource["telecom"].as_array()?.iter().find_map(|contact| {
        if contact["system"].as_str() == Some(system) {
            contact["value"].as_str().map(String::from)
        } else {
            None
        }
    })
}

fn extension_value<'a>(resource: &'a JsonValue, url: &str) -> Option<&'a JsonValue> {
    resource["extension"]
        .as_array()?
        .iter()
        .find(|ext| ext["url"].as_str() == Some(url))
}

fn parse_instant(resource: &JsonValue, field: &str) -> Result<DateTime<Utc>> {
    let raw = resource[field]
        .as_str()
        .ok_or_else(|| Error::transform(format!("appointment is missing {field}")))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| Error::transform(format!("bad {field} {raw:?}: {err}")))
}

fn map_status(raw: &str, appointment_id: &str) -> SessionStatus {
    match raw {
        "fulfilled" => SessionStatus::Completed,
        "cancelled" => SessionStatus::Cancelled,
        "noshow" => SessionStatus::NoShow,
        "arrived" | "checked-in" => SessionStatus::Confirmed,
        "booked" | "pending" | "proposed" => SessionStatus::Scheduled,
        other => {
            warn!(
                "[Remote] Appointment {} has unmapped status {:?}, treating as scheduled",
                appointment_id, other
            );
            SessionStatus::Scheduled
        }
    }
}

/// Maps FHIR R4 Practitioner, Patient and Appointment resources onto the
/// local entities.
#[derive(Debug, Default, Clone)]
pub struct FhirTransformer;

impl FhirTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl EntityTransformer for FhirTransformer {
    fn practitioner_upsert(
        &self,
        resource: &JsonValue,
        _existing: Option<&Practitioner>,
    ) -> Result<PractitionerUpsert> {
        let external_id = self
            .resource_id(resource)
            .ok_or_else(|| Error::transform("practitioner resource has no id"))?;
        let (first_name, last_name) = human_name(resource);
        Ok(PractitionerUpsert {
            external_id,
            first_name,
            last_name,
            email: telecom_value(resource, "email"),
            phone: telecom_value(resource, "phone"),
            specialty: resource["qualification"][0]["code"]["text"]
                .as_str()
                .map(String::from),
            is_active: resource["active"].as_bool().unwrap_or(true),
        })
    }

    fn client_upsert(
        &self,
        resource: &JsonValue,
        practitioner_id: &str,
        _existing: Option<&Client>,
    ) -> Result<ClientUpsert> {
        let external_id = self
            .resource_id(resource)
            .ok_or_else(|| Error::transform("patient resource has no id"))?;
        let (first_name, last_name) = human_name(resource);
        let date_of_birth = match resource["birthDate"].as_str() {
            Some(raw) => Some(
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .map_err(|err| Error::transform(format!("bad birthDate {raw:?}: {err}")))?,
            ),
            None => None,
        };
        Ok(ClientUpsert {
            external_id,
            practitioner_id: practitioner_id.to_string(),
            first_name,
            last_name,
            date_of_birth,
            email: telecom_value(resource, "email"),
            phone: telecom_value(resource, "phone"),
            presenting_issues: extension_value(resource, EXT_PRESENTING_ISSUES)
                .and_then(|ext| ext["valueString"].as_str())
                .map(String::from),
            mhcp_total_sessions: extension_value(resource, EXT_MHCP_TOTAL_SESSIONS)
                .and_then(|ext| ext["valueInteger"].as_i64())
                .map(|total| total as i32),
            is_active: resource["active"].as_bool().unwrap_or(true),
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
        let external_id = self
            .resource_id(resource)
            .ok_or_else(|| Error::transform("appointment resource has no id"))?;
        let status = map_status(
            resource["status"].as_str().unwrap_or_default(),
            &external_id,
        );
        let start = parse_instant(resource, "start")?;
        let end = parse_instant(resource, "end")?;
        Ok(SessionUpsert {
            external_id,
            practitioner_id: practitioner_id.to_string(),
            client_id: client_id.to_string(),
            scheduled_start: start,
            scheduled_end: end,
            // The platform does not report actual times separately; a
            // fulfilled appointment is taken to have run as scheduled.
            actual_start: status.is_completed().then_some(start),
            actual_end: status.is_completed().then_some(end),
            session_number,
            status,
            billing_code: resource["serviceType"][0]["coding"][0]["code"]
                .as_str()
                .map(String::from),
            fee_cents: extension_value(resource, EXT_FEE_CENTS)
                .and_then(|ext| ext["valueInteger"].as_i64()),
        })
    }

    fn appointment_refs(&self, resource: &JsonValue) -> Result<AppointmentRefs> {
        let mut refs = AppointmentRefs::default();
        if let Some(participants) = resource["participant"].as_array() {
            for participant in participants {
                let Some(reference) = participant["actor"]["reference"].as_str() else {
                    continue;
                };
                if let Some(id) = reference_id(reference, "Patient") {
                    refs.patient_external_id = Some(id.to_string());
                } else if let Some(id) = reference_id(reference, "Practitioner") {
                    refs.practitioner_external_id = Some(id.to_string());
                }
            }
        }
        Ok(refs)
    }

    fn patient_practitioner_ref(&self, resource: &JsonValue) -> Option<String> {
        resource["generalPractitioner"][0]["reference"]
            .as_str()
            .and_then(|reference| reference_id(reference, "Practitioner"))
            .map(String::from)
    }

    fn resource_id(&self, resource: &JsonValue) -> Option<String> {
        resource["id"].as_str().map(String::from)
    }
}
