//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers.

use prometheus::{Gauge, Registry};
use std::sync::Arc;
use std::time::Instant;

use trivy_metrics_exporter::{CollectorRunner, Config, ReportCache};

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub scrape_duration: Gauge,
    pub cache_synced: Gauge,
    pub cache: Arc<ReportCache>,
    pub config: Arc<Config>,
    /// Report collector runner; `None` on non-leader replicas.
    pub runner: Option<Arc<CollectorRunner>>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}
