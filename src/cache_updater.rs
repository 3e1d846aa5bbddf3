//! Cache sync from report snapshot files.
//!
//! A snapshot file holds one list per report kind, in JSON or YAML. Each
//! sync replaces the whole cache atomically. A failed sync keeps the
//! previous snapshot in place.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, instrument};

use crate::cache::{CacheContents, CacheCounts, ReportCache};
use crate::report::{
    ConfigAuditReport, ExposedSecretReport, RbacAssessmentReport, VulnerabilityReport,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read report snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON report snapshot {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse YAML report snapshot {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// On-disk layout of a report snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSnapshot {
    #[serde(default)]
    pub vulnerability_reports: Vec<VulnerabilityReport>,
    #[serde(default)]
    pub exposed_secret_reports: Vec<ExposedSecretReport>,
    #[serde(default)]
    pub config_audit_reports: Vec<ConfigAuditReport>,
    #[serde(default)]
    pub rbac_assessment_reports: Vec<RbacAssessmentReport>,
}

impl ReportSnapshot {
    /// Builds cache contents. Summaries are recomputed for reports that
    /// carry their findings; later duplicates of a namespace/name win.
    pub fn into_contents(self) -> CacheContents {
        let mut contents = CacheContents::default();
        for mut r in self.vulnerability_reports {
            r.refresh_summary();
            contents.insert(r);
        }
        for mut r in self.exposed_secret_reports {
            r.refresh_summary();
            contents.insert(r);
        }
        for mut r in self.config_audit_reports {
            r.refresh_summary();
            contents.insert(r);
        }
        for mut r in self.rbac_assessment_reports {
            r.refresh_summary();
            contents.insert(r);
        }
        contents
    }
}

/// Reads a snapshot file. `.json` files are parsed as JSON, anything else
/// as YAML.
pub fn load_snapshot(path: &Path) -> Result<ReportSnapshot, SnapshotError> {
    let content = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        }),
        _ => serde_yaml::from_str(&content).map_err(|source| SnapshotError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Replaces the cache contents with the snapshot at `path`.
#[instrument(skip(cache), fields(path = %path.display()))]
pub fn sync_from_file(cache: &ReportCache, path: &Path) -> Result<CacheCounts, SnapshotError> {
    let start = Instant::now();
    let contents = load_snapshot(path)?.into_contents();
    let counts = contents.counts();
    cache.replace_all(contents);

    debug!(
        "Report cache synced in {:.2}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(counts)
}

/// Resyncs the cache from `path` every `interval` until `shutdown`
/// resolves. The first resync happens one interval after the call.
pub async fn run_resync_loop<F>(
    cache: Arc<ReportCache>,
    path: PathBuf,
    interval: Duration,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    info!(
        "Starting report cache resync every {}s from {}",
        interval.as_secs(),
        path.display()
    );

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Report cache resync stopped");
                break;
            }
            _ = ticker.tick() => {
                match sync_from_file(&cache, &path) {
                    Ok(counts) => debug!("Report cache resynced: {} reports", counts.total()),
                    Err(e) => error!("Report cache resync failed, keeping previous snapshot: {}", e),
                }
            }
        }
    }
}
