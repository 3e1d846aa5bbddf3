//! HTTP endpoint handlers for the exporter.
//!
//! - `/metrics`: Prometheus metrics endpoint
//! - `/health`: Report cache health
//! - `/`: Landing page

pub mod health;
pub mod metrics;
pub mod root;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use root::root_handler;
