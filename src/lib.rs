//! Trivy Metrics Exporter Library
//!
//! Turns cached Trivy assessment reports into per-severity Prometheus
//! gauges. Nothing is kept in gauges between scrapes: every scrape lists
//! the cached reports and emits one sample per severity bucket of each
//! report's summary.
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use prometheus::Registry;
//! use trivy_metrics_exporter::{
//!     CacheContents, CollectorRunner, ReportCache, ResourcesMetricsCollector,
//! };
//!
//! let cache = Arc::new(ReportCache::new());
//! cache.replace_all(CacheContents::default());
//!
//! let registry = Registry::new();
//! let collector = ResourcesMetricsCollector::new(cache, Vec::new()).unwrap();
//! let runner = CollectorRunner::new(collector, registry.clone());
//! runner.start().unwrap();
//!
//! // Report gauges are computed here.
//! let families = registry.gather();
//! assert!(families.is_empty());
//!
//! runner.stop();
//! ```

pub mod cache;
pub mod cache_updater;
pub mod collector;
pub mod config;
pub mod emitter;
pub mod lifecycle;
pub mod report;

// Re-export main types for convenience
pub use cache::{
    CacheContents, CacheCounts, CacheError, ListError, ReportCache, ReportList, ReportLister,
};
pub use cache_updater::{load_snapshot, sync_from_file, ReportSnapshot, SnapshotError};
pub use collector::ResourcesMetricsCollector;
pub use config::Config;
pub use emitter::{MetricSink, ReportDescriptor, Sample, SampleBuffer};
pub use lifecycle::{
    should_run, start_if_leader, CollectorRunner, LeaderElectionRunnable, RegistrationError,
    RunnerState,
};
pub use report::{ReportKind, Severity};
