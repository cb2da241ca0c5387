//! Health check handler for service monitoring.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests
    pub status: String,
    /// Service version information
    pub version: String,
    /// Number of routing rules loaded at startup
    pub rules_loaded: usize,
}

/// Health check endpoint handler.
///
/// Called frequently by load balancers, so it touches no destinations.
#[instrument(name = "health_check", skip(app_state))]
pub async fn health_check(State(app_state): State<AppState>) -> Json<HealthResponse> {
    debug!(rules = app_state.rules.len(), "Health check completed");

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        rules_loaded: app_state.rules.len(),
    })
}
