//! Report resource types.
//!
//! These mirror the resources written by the scanner integration. Field
//! names serialize in camelCase so report snapshots exported from the
//! cluster deserialize as-is. Severities stay plain strings on the wire;
//! see [`Severity::parse`](super::Severity::parse).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::summary::{
    aggregate, ConfigAuditSummary, ExposedSecretSummary, RbacAssessmentSummary,
    VulnerabilitySummary,
};
use super::Finding;

/// Kinds of report resources held in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportKind {
    Vulnerability,
    ExposedSecret,
    ConfigAudit,
    RbacAssessment,
}

impl ReportKind {
    /// Lower-case plural resource name, as used in log output.
    pub fn resource_name(self) -> &'static str {
        match self {
            ReportKind::Vulnerability => "vulnerabilityreports",
            ReportKind::ExposedSecret => "exposedsecretreports",
            ReportKind::ConfigAudit => "configauditreports",
            ReportKind::RbacAssessment => "rbacassessmentreports",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource_name())
    }
}

/// Identity of a namespaced resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub namespace: String,
    pub name: String,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

/// Scanner that produced a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scanner {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub version: String,
}

/// Container image registry the scanned image was pulled from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRegistry {
    #[serde(default)]
    pub server: String,
}

/// Scanned image reference within its registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(default)]
    pub repository: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub digest: String,
}

/// One audit step of a config-audit or RBAC assessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    #[serde(rename = "checkID", default)]
    pub check_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub severity: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub messages: Vec<String>,
    pub success: bool,
}

impl Finding for Check {
    fn severity_value(&self) -> &str {
        &self.severity
    }

    fn is_failure(&self) -> bool {
        !self.success
    }
}

/// A vulnerability detected in an image package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    #[serde(rename = "vulnerabilityID")]
    pub vulnerability_id: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub installed_version: String,
    #[serde(default)]
    pub fixed_version: String,
    pub severity: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub primary_link: String,
}

impl Finding for Vulnerability {
    fn severity_value(&self) -> &str {
        &self.severity
    }
}

/// A secret found in an image layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedSecret {
    #[serde(default)]
    pub target: String,
    #[serde(rename = "ruleID", default)]
    pub rule_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub severity: String,
    #[serde(rename = "match", default)]
    pub matched: String,
}

impl Finding for ExposedSecret {
    fn severity_value(&self) -> &str {
        &self.severity
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityReportData {
    #[serde(default)]
    pub update_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scanner: Scanner,
    #[serde(default)]
    pub registry: ImageRegistry,
    #[serde(default)]
    pub artifact: Artifact,
    #[serde(default)]
    pub summary: VulnerabilitySummary,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

/// Vulnerability scan results for one container image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityReport {
    pub metadata: ObjectMeta,
    pub report: VulnerabilityReportData,
}

impl VulnerabilitySummary {
    pub fn from_vulnerabilities(vulnerabilities: &[Vulnerability]) -> Self {
        aggregate(vulnerabilities)
    }
}

impl VulnerabilityReport {
    /// Recomputes the summary from the embedded findings, if any.
    pub fn refresh_summary(&mut self) {
        if !self.report.vulnerabilities.is_empty() {
            self.report.summary =
                VulnerabilitySummary::from_vulnerabilities(&self.report.vulnerabilities);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedSecretReportData {
    #[serde(default)]
    pub update_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scanner: Scanner,
    #[serde(default)]
    pub registry: ImageRegistry,
    #[serde(default)]
    pub artifact: Artifact,
    #[serde(default)]
    pub summary: ExposedSecretSummary,
    #[serde(default)]
    pub secrets: Vec<ExposedSecret>,
}

/// Exposed secret scan results for one container image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposedSecretReport {
    pub metadata: ObjectMeta,
    pub report: ExposedSecretReportData,
}

impl ExposedSecretSummary {
    pub fn from_secrets(secrets: &[ExposedSecret]) -> Self {
        aggregate(secrets)
    }
}

impl ExposedSecretReport {
    pub fn refresh_summary(&mut self) {
        if !self.report.secrets.is_empty() {
            self.report.summary = ExposedSecretSummary::from_secrets(&self.report.secrets);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigAuditReportData {
    #[serde(default)]
    pub update_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scanner: Scanner,
    #[serde(default)]
    pub summary: ConfigAuditSummary,
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// Configuration audit results for one workload or cluster object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigAuditReport {
    pub metadata: ObjectMeta,
    pub report: ConfigAuditReportData,
}

impl ConfigAuditSummary {
    pub fn from_checks(checks: &[Check]) -> Self {
        aggregate(checks)
    }
}

impl ConfigAuditReport {
    pub fn refresh_summary(&mut self) {
        if !self.report.checks.is_empty() {
            self.report.summary = ConfigAuditSummary::from_checks(&self.report.checks);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacAssessmentReportData {
    #[serde(default)]
    pub update_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scanner: Scanner,
    #[serde(default)]
    pub summary: RbacAssessmentSummary,
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// RBAC assessment results for one role or cluster role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RbacAssessmentReport {
    pub metadata: ObjectMeta,
    pub report: RbacAssessmentReportData,
}

impl RbacAssessmentSummary {
    pub fn from_checks(checks: &[Check]) -> Self {
        aggregate(checks)
    }
}

impl RbacAssessmentReport {
    pub fn refresh_summary(&mut self) {
        if !self.report.checks.is_empty() {
            self.report.summary = RbacAssessmentSummary::from_checks(&self.report.checks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vulnerability_report_deserializes_camel_case() {
        let json = r#"{
            "metadata": {"namespace": "ns1", "name": "replicaset-app-7d9f-app"},
            "report": {
                "updateTimestamp": "2024-05-01T10:00:00Z",
                "scanner": {"name": "Trivy", "vendor": "Aqua Security", "version": "0.50.0"},
                "registry": {"server": "reg.io"},
                "artifact": {"repository": "app", "tag": "v1", "digest": "sha256:abc"},
                "summary": {"criticalCount": 2, "mediumCount": 1},
                "vulnerabilities": []
            }
        }"#;

        let report: VulnerabilityReport = serde_json::from_str(json).unwrap();
        assert_eq!(report.metadata.namespace, "ns1");
        assert_eq!(report.report.registry.server, "reg.io");
        assert_eq!(report.report.artifact.digest, "sha256:abc");
        assert_eq!(report.report.summary.critical_count, 2);
        assert_eq!(report.report.summary.high_count, 0);
        assert_eq!(report.report.summary.medium_count, 1);
        assert!(report.report.update_timestamp.is_some());
    }

    #[test]
    fn test_unknown_severity_string_deserializes() {
        let json = r#"{"checkID": "KSV001", "severity": "NEGLIGIBLE", "success": false}"#;
        let check: Check = serde_json::from_str(json).unwrap();
        assert_eq!(check.check_id, "KSV001");
        assert_eq!(check.severity(), None);
    }

    #[test]
    fn test_refresh_summary_recomputes_from_checks() {
        let mut report = ConfigAuditReport {
            metadata: ObjectMeta::new("ns1", "deployment-web"),
            report: ConfigAuditReportData {
                summary: ConfigAuditSummary {
                    critical_count: 9,
                    ..ConfigAuditSummary::default()
                },
                checks: vec![
                    Check {
                        severity: "HIGH".into(),
                        success: false,
                        ..Check::default()
                    },
                    Check {
                        severity: "HIGH".into(),
                        success: true,
                        ..Check::default()
                    },
                ],
                ..ConfigAuditReportData::default()
            },
        };

        report.refresh_summary();
        assert_eq!(report.report.summary.critical_count, 0);
        assert_eq!(report.report.summary.high_count, 1);
    }

    #[test]
    fn test_refresh_summary_keeps_stored_summary_without_findings() {
        let mut report = RbacAssessmentReport {
            metadata: ObjectMeta::new("ns1", "role-admin"),
            report: RbacAssessmentReportData {
                summary: RbacAssessmentSummary {
                    low_count: 3,
                    ..RbacAssessmentSummary::default()
                },
                ..RbacAssessmentReportData::default()
            },
        };

        report.refresh_summary();
        assert_eq!(report.report.summary.low_count, 3);
    }

    #[test]
    fn test_secret_summary_from_secrets() {
        let secrets = vec![
            ExposedSecret {
                rule_id: "aws-access-key-id".into(),
                severity: "CRITICAL".into(),
                ..ExposedSecret::default()
            },
            ExposedSecret {
                rule_id: "github-pat".into(),
                severity: "CRITICAL".into(),
                ..ExposedSecret::default()
            },
        ];
        let summary = ExposedSecretSummary::from_secrets(&secrets);
        assert_eq!(summary.critical_count, 2);
    }
}
