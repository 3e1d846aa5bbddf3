//! Collect command implementation.
//!
//! Loads a report snapshot into a private cache, runs one collection pass
//! through a throwaway registry and prints the exposition text.

use anyhow::Context;
use prometheus::{Encoder, Registry, TextEncoder};
use std::path::PathBuf;
use std::sync::Arc;

use trivy_metrics_exporter::cache_updater::sync_from_file;
use trivy_metrics_exporter::config::{parse_namespace_list, validate_namespaces};
use trivy_metrics_exporter::{CollectorRunner, Config, ReportCache, ResourcesMetricsCollector};

/// Runs a single collection pass and writes the result to stdout.
pub fn command_collect(
    snapshot: Option<PathBuf>,
    namespaces: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let snapshot = snapshot
        .or_else(|| config.snapshot_path.clone())
        .ok_or_else(|| anyhow::anyhow!("no report snapshot given (use --snapshot)"))?;

    let cache = Arc::new(ReportCache::new());
    let counts = sync_from_file(&cache, &snapshot).context("failed to load report snapshot")?;
    eprintln!(
        "Loaded {} reports from {}",
        counts.total(),
        snapshot.display()
    );

    let target_namespaces = match namespaces {
        Some(list) => parse_namespace_list(&list),
        None => config.target_namespaces(),
    };
    validate_namespaces(&target_namespaces).map_err(|e| anyhow::anyhow!("{}", e))?;

    let registry = Registry::new();
    let collector = ResourcesMetricsCollector::new(cache, target_namespaces)?;
    let runner = CollectorRunner::new(collector, registry.clone());
    runner
        .start()
        .context("failed to register resources metrics collector")?;

    let families = registry.gather();
    runner.stop();

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .context("failed to encode metrics")?;
    print!("{}", String::from_utf8(buffer)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_rejects_invalid_namespace_list() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("reports.yaml");
        std::fs::write(&snapshot, "configAuditReports: []\n").unwrap();

        let err = command_collect(
            Some(snapshot),
            Some("ns1,Not_Valid".to_string()),
            &Config::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Not_Valid"));
    }
}
