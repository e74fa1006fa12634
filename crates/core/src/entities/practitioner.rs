use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A practitioner mirrored from the remote platform.
///
/// Created on the first sync that touches its external id, mutated on every
/// subsequent sync, never deleted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Practitioner {
    pub id: String,
    /// Immutable join key assigned by the remote platform.
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub is_active: bool,
    pub last_synced_at: DateTime<Utc>,
}

/// Write model produced by the transformer for a practitioner upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerUpsert {
    pub external_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub is_active: bool,
}

/// Local/external id pair used by the scheduled reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PractitionerRef {
    pub local_id: String,
    pub external_id: String,
}
