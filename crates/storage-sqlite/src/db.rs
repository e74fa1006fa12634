//! Connection pool and serialized write access.

use std::sync::Arc;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::SqliteConnection;

use clinic_sync_core::{DatabaseError, Result};

use crate::errors::StorageError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Debug)]
struct SqlitePragmas;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        conn.batch_execute("PRAGMA busy_timeout = 5000; PRAGMA foreign_keys = ON;")
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn create_pool(database_url: &str) -> std::result::Result<Arc<DbPool>, StorageError> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .connection_customizer(Box::new(SqlitePragmas))
        .build(manager)?;
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &Arc<DbPool>) -> std::result::Result<DbConnection, StorageError> {
    pool.get().map_err(StorageError::from)
}

/// Serializes writes through a single async gate so SQLite never sees two
/// concurrent writers, and keeps blocking diesel calls off the async runtime.
#[derive(Clone)]
pub struct WriteHandle {
    pool: Arc<DbPool>,
    gate: Arc<tokio::sync::Mutex<()>>,
}

impl WriteHandle {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self {
            pool,
            gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.gate.lock().await;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection(&pool)?;
            job(&mut conn)
        })
        .await
        .map_err(|err| DatabaseError::Internal(format!("write task failed: {err}")))?
    }
}

/// Creates the mirror tables when they do not exist yet. Runs on every
/// startup; existing data is left untouched.
pub fn bootstrap_schema(pool: &Arc<DbPool>) -> std::result::Result<(), StorageError> {
    let mut conn = get_connection(pool)?;
    conn.batch_execute(
        r#"
        CREATE TABLE IF NOT EXISTS practitioners (
            id TEXT PRIMARY KEY NOT NULL,
            external_id TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT,
            phone TEXT,
            specialty TEXT,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            last_synced_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS clients (
            id TEXT PRIMARY KEY NOT NULL,
            external_id TEXT NOT NULL UNIQUE,
            practitioner_id TEXT NOT NULL REFERENCES practitioners(id),
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            date_of_birth TEXT,
            email TEXT,
            phone TEXT,
            presenting_issues TEXT,
            mhcp_total_sessions INTEGER,
            mhcp_used_sessions INTEGER NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            last_synced_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_clients_practitioner ON clients(practitioner_id);

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY NOT NULL,
            external_id TEXT NOT NULL UNIQUE,
            practitioner_id TEXT NOT NULL REFERENCES practitioners(id),
            client_id TEXT NOT NULL REFERENCES clients(id),
            scheduled_start TEXT NOT NULL,
            scheduled_end TEXT NOT NULL,
            actual_start TEXT,
            actual_end TEXT,
            session_number INTEGER NOT NULL,
            status TEXT NOT NULL,
            billing_code TEXT,
            fee_cents BIGINT
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_client ON sessions(client_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_practitioner ON sessions(practitioner_id);

        CREATE TABLE IF NOT EXISTS sync_logs (
            id TEXT PRIMARY KEY NOT NULL,
            sync_type TEXT NOT NULL,
            entity_kind TEXT NOT NULL,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            records_processed INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            practitioner_external_id TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_sync_logs_started ON sync_logs(started_at);
        "#,
    )?;
    Ok(())
}
