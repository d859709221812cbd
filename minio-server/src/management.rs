//! The management API served on the web listener.
//!
//! It knows nothing about storage and only exposes read-only [`ProcessInfo`].

use std::sync::Arc;

use axum::extract::State;
use axum::{Json, Router, routing};

use crate::endpoints::health;
use crate::process::ProcessInfo;

/// Creates the router of the management API.
pub fn routes() -> Router<Arc<ProcessInfo>> {
    Router::new()
        .merge(health::router())
        .route("/info", routing::get(info))
}

async fn info(State(info): State<Arc<ProcessInfo>>) -> Json<ProcessInfo> {
    Json(ProcessInfo::clone(&info))
}
