//! Local domain entities mirrored from the remote practice platform.

mod client;
mod practitioner;
mod session;

pub use client::{Client, ClientUpsert};
pub use practitioner::{Practitioner, PractitionerRef, PractitionerUpsert};
pub use session::{Session, SessionStatus, SessionUpsert};

/// Result of an upsert keyed on the entity's external id.
#[derive(Debug, Clone)]
pub struct Upserted<T> {
    pub entity: T,
    /// True when the row was inserted, false when an existing row was updated.
    pub created: bool,
}
