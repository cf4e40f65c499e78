use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::resilience::BreakerStatus;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub circuit_breaker: BreakerStatus,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        circuit_breaker: state.breaker.status(),
    })
}

/// Force the breaker closed and return its fresh status.
pub async fn reset_breaker(State(state): State<AppState>) -> Json<BreakerStatus> {
    state.breaker.reset();
    tracing::info!("Circuit breaker reset via admin API");
    Json(state.breaker.status())
}
