//! Webhook intake from the remote practice platform.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::Sha256;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-webhook-signature";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/practice", post(receive_webhook))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookResponse {
    success: bool,
    event: String,
    records_processed: usize,
    duration_ms: i64,
}

/// Verifies the hex HMAC-SHA256 signature over the raw request body. Without
/// a configured secret every delivery is accepted; deployments are expected
/// to set one outside local development.
fn verify_signature(secret: Option<&str>, headers: &HeaderMap, body: &[u8]) -> ApiResult<()> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("missing webhook signature".to_string()))?;
    let signature = hex::decode(header.trim())
        .map_err(|_| ApiError::Unauthorized("malformed webhook signature".to_string()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::Internal("invalid webhook secret".to_string()))?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| ApiError::Unauthorized("webhook signature mismatch".to_string()))
}

async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    verify_signature(state.webhook_secret.as_deref(), &headers, &body)?;

    let payload: JsonValue = serde_json::from_slice(&body)
        .map_err(|err| ApiError::BadRequest(format!("invalid JSON payload: {err}")))?;
    let event = payload["event"]
        .as_str()
        .ok_or_else(|| ApiError::BadRequest("payload is missing \"event\"".to_string()))?
        .to_string();
    let data = payload
        .get("data")
        .filter(|data| data.is_object())
        .ok_or_else(|| ApiError::BadRequest("payload is missing \"data\"".to_string()))?;

    info!("[Webhook] Received {}", event);
    let outcome = state.orchestrator.incremental_sync(&event, data).await;
    if !outcome.success {
        // The failure is recorded in the sync log; the delivery itself is
        // acknowledged so the sender does not redeliver a bad payload.
        let detail = outcome
            .errors
            .iter()
            .map(|err| err.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        warn!("[Webhook] {} failed: {}", event, detail);
    }

    Ok(Json(WebhookResponse {
        success: outcome.success,
        event,
        records_processed: outcome.records_processed(),
        duration_ms: outcome.duration_ms,
    }))
}
