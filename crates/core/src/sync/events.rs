//! Webhook event vocabulary.

use crate::sync::log::SyncEntityKind;

/// Closed set of change notifications the remote platform delivers, plus an
/// explicit variant for anything else. Dispatch happens over this enum, not
/// over raw event strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    AppointmentCreated,
    AppointmentUpdated,
    AppointmentCancelled,
    AppointmentDeleted,
    PatientCreated,
    PatientUpdated,
    PatientDeleted,
    PractitionerUpdated,
    Unrecognized(String),
}

impl WebhookEvent {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "appointment.created" => Self::AppointmentCreated,
            "appointment.updated" => Self::AppointmentUpdated,
            "appointment.cancelled" => Self::AppointmentCancelled,
            "appointment.deleted" => Self::AppointmentDeleted,
            "patient.created" => Self::PatientCreated,
            "patient.updated" => Self::PatientUpdated,
            "patient.deleted" => Self::PatientDeleted,
            "practitioner.updated" => Self::PractitionerUpdated,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Entity tag for the audit log entry of this event.
    pub fn entity_kind(&self) -> SyncEntityKind {
        match self {
            Self::AppointmentCreated
            | Self::AppointmentUpdated
            | Self::AppointmentCancelled
            | Self::AppointmentDeleted => SyncEntityKind::Session,
            Self::PatientCreated | Self::PatientUpdated | Self::PatientDeleted => {
                SyncEntityKind::Client
            }
            Self::PractitionerUpdated => SyncEntityKind::Practitioner,
            Self::Unrecognized(_) => SyncEntityKind::All,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AppointmentCreated => "appointment.created",
            Self::AppointmentUpdated => "appointment.updated",
            Self::AppointmentCancelled => "appointment.cancelled",
            Self::AppointmentDeleted => "appointment.deleted",
            Self::PatientCreated => "patient.created",
            Self::PatientUpdated => "patient.updated",
            Self::PatientDeleted => "patient.deleted",
            Self::PractitionerUpdated => "practitioner.updated",
            Self::Unrecognized(raw) => raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_events_round_trip() {
        for raw in [
            "appointment.created",
            "appointment.updated",
            "appointment.cancelled",
            "appointment.deleted",
            "patient.created",
            "patient.updated",
            "patient.deleted",
            "practitioner.updated",
        ] {
            let event = WebhookEvent::parse(raw);
            assert!(!matches!(event, WebhookEvent::Unrecognized(_)), "{raw}");
            assert_eq!(event.as_str(), raw);
        }
    }

    #[test]
    fn unknown_event_is_preserved() {
        let event = WebhookEvent::parse("invoice.created");
        assert_eq!(
            event,
            WebhookEvent::Unrecognized("invoice.created".to_string())
        );
        assert_eq!(event.as_str(), "invoice.created");
        assert_eq!(event.entity_kind(), SyncEntityKind::All);
    }

    #[test]
    fn entity_kind_follows_event_prefix() {
        assert_eq!(
            WebhookEvent::AppointmentDeleted.entity_kind(),
            SyncEntityKind::Session
        );
        assert_eq!(
            WebhookEvent::PatientUpdated.entity_kind(),
            SyncEntityKind::Client
        );
        assert_eq!(
            WebhookEvent::PractitionerUpdated.entity_kind(),
            SyncEntityKind::Practitioner
        );
    }
}
