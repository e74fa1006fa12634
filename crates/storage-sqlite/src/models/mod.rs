//! Diesel row models and their conversions to the domain entities.

mod client;
mod practitioner;
mod session;
mod sync_log;

pub use client::{ClientChangeset, ClientDB};
pub use practitioner::{PractitionerChangeset, PractitionerDB};
pub use session::{SessionChangeset, SessionDB};
pub use sync_log::SyncLogDB;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::errors::StorageError;

/// Enum columns are stored as their serde string form (`"completed"`,
/// `"no_show"`), matching the wire representation.
pub(crate) fn enum_to_db<T: Serialize>(value: &T) -> Result<String, StorageError> {
    match serde_json::to_value(value) {
        Ok(JsonValue::String(raw)) => Ok(raw),
        Ok(other) => Err(StorageError::Data(format!(
            "enum did not serialize to a string: {other}"
        ))),
        Err(err) => Err(StorageError::Data(err.to_string())),
    }
}

pub(crate) fn enum_from_db<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_value(JsonValue::String(raw.to_string()))
        .map_err(|err| StorageError::Data(format!("bad enum value {raw:?}: {err}")))
}

pub(crate) fn utc_to_db(value: DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(crate) fn utc_from_db(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StorageError::Data(format!("bad timestamp {raw:?}: {err}")))
}

pub(crate) fn date_to_db(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

pub(crate) fn date_from_db(raw: &str) -> Result<NaiveDate, StorageError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| StorageError::Data(format!("bad date {raw:?}: {err}")))
}
