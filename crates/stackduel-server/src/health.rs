use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub system_info: SystemInfo,
    pub rooms: usize,
}

#[derive(Debug, Serialize)]
pub struct SystemInfo {
    pub version: &'static str,
}

/// GET /healthcheck
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "available",
        system_info: SystemInfo {
            version: env!("CARGO_PKG_VERSION"),
        },
        rooms: state.directory.len().await,
    })
}
