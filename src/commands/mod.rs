//! CLI command implementations for trivy-metrics-exporter.
//!
//! - `collect`: One-shot collection pass over a report snapshot
//! - `config`: Configuration file generation

pub mod collect;
pub mod config;

pub use collect::command_collect;
pub use config::{command_config, show_config};
