//! Assessment report model.
//!
//! This module defines the report resources produced by the scanner
//! integration (vulnerability, exposed-secret, config-audit and RBAC
//! assessment reports) together with the severity-bucketed summaries
//! the collector turns into gauges.

pub mod summary;
pub mod types;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use summary::{
    aggregate, ConfigAuditSummary, ExposedSecretSummary, RbacAssessmentSummary, SeverityBucket,
    SeveritySummary, VulnerabilitySummary,
};
pub use types::{
    Artifact, Check, ConfigAuditReport, ConfigAuditReportData, ExposedSecret,
    ExposedSecretReport, ExposedSecretReportData, ImageRegistry, ObjectMeta,
    RbacAssessmentReport, RbacAssessmentReportData, ReportKind, Scanner, Vulnerability,
    VulnerabilityReport, VulnerabilityReportData,
};

/// Risk level attached to a finding, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    /// Parses a severity as written by the scanner ("CRITICAL", "High", ...).
    ///
    /// Returns `None` for anything outside the recognized levels; callers
    /// treat such findings as contributing to no bucket.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Unknown,
        ]
        .into_iter()
        .find(|s| s.label().eq_ignore_ascii_case(value))
    }

    /// Label value used for the `severity` metric label.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single scan or audit result that may count towards a summary bucket.
pub trait Finding {
    /// Raw severity as stored on the resource.
    fn severity_value(&self) -> &str;

    /// Whether this finding is a failure. Passing checks never count.
    fn is_failure(&self) -> bool {
        true
    }

    fn severity(&self) -> Option<Severity> {
        Severity::parse(self.severity_value())
    }
}
