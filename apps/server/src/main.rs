//! clinic-sync server: webhook intake, scheduled reconciliation and sync
//! observability over a local SQLite mirror of a remote practice platform.

mod api;
mod config;
mod error;
mod scheduler;
mod state;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use clinic_sync_core::remote::RemoteDirectory;
use clinic_sync_core::store::PracticeStore;
use clinic_sync_core::sync::{ScheduledReconciler, SyncOrchestrator};
use clinic_sync_remote::{FhirTransformer, OAuthTokenProvider, PracticeApiClient, RemoteConfig, SlidingWindowLimiter};
use clinic_sync_storage_sqlite::{bootstrap_schema, create_pool, SqliteStore, WriteHandle};

use crate::config::ServerConfig;
use crate::state::{AppState, UnconfiguredRemote};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        tracing::error!("fatal: {err}");
        std::process::exit(1);
    }
}

fn build_remote(
    config: &ServerConfig,
) -> Result<(Arc<dyn RemoteDirectory>, bool), Box<dyn std::error::Error>> {
    match &config.remote {
        Some(settings) => {
            let mut remote_config = RemoteConfig::new(
                &settings.api_url,
                &settings.token_url,
                &settings.client_id,
                &settings.client_secret,
            );
            remote_config.max_requests_per_minute = settings.max_requests_per_minute;
            let tokens = Arc::new(OAuthTokenProvider::new(
                reqwest::Client::new(),
                remote_config.token_url.clone(),
                remote_config.client_id.clone(),
                remote_config.client_secret.clone(),
            ));
            let limiter = Arc::new(SlidingWindowLimiter::new(
                remote_config.max_requests_per_minute,
            ));
            let client = PracticeApiClient::new(&remote_config, tokens, limiter)?;
            Ok((Arc::new(client), true))
        }
        None => Ok((Arc::new(UnconfiguredRemote), false)),
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    let pool = create_pool(&config.database_url)?;
    bootstrap_schema(&pool)?;
    let writer = WriteHandle::new(pool.clone());
    let store: Arc<dyn PracticeStore> = Arc::new(SqliteStore::new(pool, writer));

    let (remote, sync_enabled) = build_remote(&config)?;
    let orchestrator = Arc::new(SyncOrchestrator::new(
        store.clone(),
        remote,
        Arc::new(FhirTransformer::new()),
    ));
    let reconciler = Arc::new(ScheduledReconciler::new(
        store.clone(),
        orchestrator.clone(),
        sync_enabled,
    ));
    let _reconcile_task = scheduler::spawn(reconciler, config.sync_interval);

    let state = Arc::new(AppState {
        orchestrator,
        store,
        webhook_secret: config.webhook_secret.clone(),
    });
    if state.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET not set, accepting unsigned webhook deliveries");
    }

    let app = api::router().with_state(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
