//! Integration tests for syncing the report cache from snapshot files.

use std::io::Write;
use std::sync::Arc;

use prometheus::{Encoder, Registry, TextEncoder};
use trivy_metrics_exporter::{
    sync_from_file, CollectorRunner, ReportCache, ResourcesMetricsCollector, SnapshotError,
};

const SNAPSHOT: &str = r#"
vulnerabilityReports:
  - metadata: {namespace: ns1, name: replicaset-app}
    report:
      registry: {server: reg.io}
      artifact: {repository: app, tag: v1, digest: "sha256:abc"}
      vulnerabilities:
        - {vulnerabilityID: CVE-2024-0001, severity: CRITICAL}
        - {vulnerabilityID: CVE-2024-0002, severity: critical}
        - {vulnerabilityID: CVE-2024-0003, severity: MEDIUM}
        - {vulnerabilityID: CVE-2024-0004, severity: NONE}
rbacAssessmentReports:
  - metadata: {namespace: ns1, name: role-admin}
    report:
      checks:
        - {checkID: KSV041, severity: CRITICAL, success: false}
"#;

/// Helper function to write snapshot content to a temporary file.
fn snapshot_file(suffix: &str, content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_snapshot_findings_drive_scrape() {
    let file = snapshot_file(".yaml", SNAPSHOT);
    let cache = Arc::new(ReportCache::new());
    let counts = sync_from_file(&cache, file.path()).unwrap();
    assert_eq!(counts.vulnerability_reports, 1);
    assert_eq!(counts.rbac_assessment_reports, 1);

    let registry = Registry::new();
    let collector = ResourcesMetricsCollector::new(cache, vec!["ns1".into()]).unwrap();
    let runner = CollectorRunner::new(collector, registry.clone());
    runner.start().unwrap();

    let mut buf = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buf)
        .unwrap();
    let text = String::from_utf8(buf).unwrap();

    let critical = text
        .lines()
        .find(|l| l.starts_with("trivy_image_vulnerabilities{") && l.contains("severity=\"Critical\""))
        .unwrap();
    assert!(critical.ends_with(" 2"));

    let unknown = text
        .lines()
        .find(|l| l.starts_with("trivy_image_vulnerabilities{") && l.contains("severity=\"Unknown\""))
        .unwrap();
    // Unrecognized severities are not counted anywhere.
    assert!(unknown.ends_with(" 0"));

    // RBAC assessments are cached but not exported.
    assert!(!text.contains("role-admin"));
}

#[test]
fn test_invalid_snapshot_leaves_cache_unsynced() {
    let file = snapshot_file(".yaml", "vulnerabilityReports: {not: [a list");
    let cache = ReportCache::new();

    let err = sync_from_file(&cache, file.path()).unwrap_err();
    assert!(matches!(err, SnapshotError::Yaml { .. }));
    assert!(!cache.is_synced());
}
