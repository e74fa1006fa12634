//! Read-only sync observability endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use clinic_sync_core::sync::{
    derive_health, SyncHealth, SyncLogEntry, SyncLogStatus, RECONCILE_INTERVAL_SECS,
};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// The mirror counts as stale after two missed reconciliation passes.
const STALE_AFTER_SECS: i64 = 2 * RECONCILE_INTERVAL_SECS as i64;

/// Entries scanned for the newest finalized one; a run in flight sits at the
/// top of the log as `in_progress` and must not mask the last real result.
const HEALTH_LOG_WINDOW: i64 = 10;

const DEFAULT_LOG_LIMIT: i64 = 50;
const MAX_LOG_LIMIT: i64 = 200;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync/health", get(sync_health))
        .route("/sync/logs", get(sync_logs))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: SyncHealth,
    last_sync: Option<SyncLogEntry>,
}

async fn sync_health(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let logs = state
        .store
        .recent_sync_logs(HEALTH_LOG_WINDOW)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    let latest_finalized = logs
        .iter()
        .find(|entry| entry.status != SyncLogStatus::InProgress);
    let status = derive_health(latest_finalized, Utc::now(), Duration::seconds(STALE_AFTER_SECS));
    Ok(Json(HealthResponse {
        status,
        last_sync: latest_finalized.cloned(),
    }))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<i64>,
}

async fn sync_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> ApiResult<Json<Vec<SyncLogEntry>>> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT);
    let logs = state
        .store
        .recent_sync_logs(limit)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(Json(logs))
}
