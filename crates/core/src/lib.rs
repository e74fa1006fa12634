//! Core domain model and sync engine for mirroring practice-management data.
//!
//! The engine pulls practitioners, clients (patients) and sessions
//! (appointments) from a remote FHIR-shaped practice platform into a local
//! store. All remote/storage/mapping concerns sit behind traits so the
//! orchestrator stays testable and host processes wire concrete services in.

pub mod entities;
pub mod errors;
pub mod remote;
pub mod store;
pub mod sync;
pub mod transform;

pub use errors::{DatabaseError, Error, RemoteError, Result};
