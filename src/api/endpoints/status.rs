//! Liveness endpoint.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since startup.
    pub uptime: u64,
    pub version: &'static str,
}

/// `GET /health`: unauthenticated liveness check for load balancers.
pub async fn check(State(ctx): State<ApiContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "OK",
        timestamp: Utc::now(),
        uptime: ctx.core.uptime_secs(),
        version: crate::config::APP_VERSION,
    })
}
