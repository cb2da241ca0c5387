//! Per-destination delivery statistics.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use pokeproxy_core::DestinationMetrics;
use tracing::{debug, instrument};

use crate::AppState;

/// Returns metrics for every destination that has received traffic.
///
/// Keys are destination URLs. Destinations that were never selected by a
/// rule do not appear.
#[instrument(name = "get_stats", skip(app_state))]
pub async fn get_stats(
    State(app_state): State<AppState>,
) -> Json<BTreeMap<String, DestinationMetrics>> {
    let snapshot = app_state.stats.snapshot_all();
    debug!(destinations = snapshot.len(), "Serving stats snapshot");
    Json(snapshot)
}
