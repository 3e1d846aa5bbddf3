//! Health check endpoint handler.
//!
//! Returns 200 once the report cache has synced, 503 before that.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tracing::{debug, instrument};

use trivy_metrics_exporter::{CacheCounts, RunnerState};

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub cache_synced: bool,
    pub last_synced: Option<String>,
    pub collector_registered: bool,
    pub reports: CacheCounts,
    pub uptime_seconds: u64,
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let snapshot = state.cache.snapshot();
    let last_synced = state.cache.last_synced();
    let synced = last_synced.is_some();

    let status = if synced {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if synced { "ok" } else { "cache not synced" },
        cache_synced: synced,
        last_synced: last_synced.map(|t| t.to_rfc3339()),
        collector_registered: state
            .runner
            .as_ref()
            .is_some_and(|r| r.state() == RunnerState::Registered),
        reports: snapshot.counts(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    };

    debug!("Health check: {} - {}", status, response.status);
    (status, Json(response))
}
