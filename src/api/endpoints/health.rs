//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;
use crate::models::SourceKind;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub sources: Vec<SourceKind>,
    pub weights_version: u64,
    pub uptime_secs: u64,
}

/// `GET /api/health`
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        sources: ctx.core.sources().to_vec(),
        weights_version: ctx.core.weights().version,
        uptime_secs: ctx.core.uptime_secs(),
    })
}
