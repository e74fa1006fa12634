//! HTTP surface: webhook intake and sync observability.

pub mod sync;
pub mod webhook;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().merge(webhook::router()).merge(sync::router())
}
