use clinic_sync_core::{DatabaseError, Error};
use thiserror::Error;

/// Failures local to the SQLite layer, folded into the engine's
/// [`DatabaseError`] at the crate boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("stored data is invalid: {0}")]
    Data(String),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Query(inner) => Error::Database(DatabaseError::Query(inner.to_string())),
            StorageError::Pool(inner) => Error::Database(DatabaseError::Pool(inner.to_string())),
            StorageError::Data(message) => Error::Database(DatabaseError::Internal(message)),
        }
    }
}
