//! Severity summaries and the aggregator that derives them from findings.
//!
//! Each report kind has a fixed-shape summary with one counter per
//! recognized severity. `SeveritySummary::BUCKETS` is the ordered
//! (severity, accessor) table the collector iterates when emitting
//! samples, so emission order follows the table.

use serde::{Deserialize, Serialize};

use super::{Finding, Severity};

/// One entry of a summary's bucket table.
pub struct SeverityBucket<S: 'static> {
    pub severity: Severity,
    pub count: fn(&S) -> u64,
}

/// Common behavior of the per-kind summaries.
pub trait SeveritySummary: Default + 'static {
    /// Recognized buckets, most severe first.
    const BUCKETS: &'static [SeverityBucket<Self>];

    /// Mutable counter for `severity`, or `None` if this kind does not
    /// track that level.
    fn bucket_mut(&mut self, severity: Severity) -> Option<&mut u64>;

    /// Sum of all buckets.
    fn total(&self) -> u64 {
        Self::BUCKETS.iter().map(|b| (b.count)(self)).sum()
    }
}

/// Counts failing findings by severity.
///
/// Passing findings and findings whose severity is not tracked by `S`
/// are skipped, so `total()` never exceeds the number of findings.
pub fn aggregate<'a, S, F, I>(findings: I) -> S
where
    S: SeveritySummary,
    F: Finding + 'a,
    I: IntoIterator<Item = &'a F>,
{
    let mut summary = S::default();
    for finding in findings {
        if !finding.is_failure() {
            continue;
        }
        let Some(severity) = finding.severity() else {
            continue;
        };
        if let Some(count) = summary.bucket_mut(severity) {
            *count += 1;
        }
    }
    summary
}

/// Vulnerability counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilitySummary {
    #[serde(default)]
    pub critical_count: u64,
    #[serde(default)]
    pub high_count: u64,
    #[serde(default)]
    pub medium_count: u64,
    #[serde(default)]
    pub low_count: u64,
    #[serde(default)]
    pub unknown_count: u64,
}

impl SeveritySummary for VulnerabilitySummary {
    const BUCKETS: &'static [SeverityBucket<Self>] = &[
        SeverityBucket { severity: Severity::Critical, count: |s: &Self| s.critical_count },
        SeverityBucket { severity: Severity::High, count: |s: &Self| s.high_count },
        SeverityBucket { severity: Severity::Medium, count: |s: &Self| s.medium_count },
        SeverityBucket { severity: Severity::Low, count: |s: &Self| s.low_count },
        SeverityBucket { severity: Severity::Unknown, count: |s: &Self| s.unknown_count },
    ];

    fn bucket_mut(&mut self, severity: Severity) -> Option<&mut u64> {
        Some(match severity {
            Severity::Critical => &mut self.critical_count,
            Severity::High => &mut self.high_count,
            Severity::Medium => &mut self.medium_count,
            Severity::Low => &mut self.low_count,
            Severity::Unknown => &mut self.unknown_count,
        })
    }
}

/// Exposed secret counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposedSecretSummary {
    #[serde(default)]
    pub critical_count: u64,
    #[serde(default)]
    pub high_count: u64,
    #[serde(default)]
    pub medium_count: u64,
    #[serde(default)]
    pub low_count: u64,
    #[serde(default)]
    pub unknown_count: u64,
}

impl SeveritySummary for ExposedSecretSummary {
    const BUCKETS: &'static [SeverityBucket<Self>] = &[
        SeverityBucket { severity: Severity::Critical, count: |s: &Self| s.critical_count },
        SeverityBucket { severity: Severity::High, count: |s: &Self| s.high_count },
        SeverityBucket { severity: Severity::Medium, count: |s: &Self| s.medium_count },
        SeverityBucket { severity: Severity::Low, count: |s: &Self| s.low_count },
        SeverityBucket { severity: Severity::Unknown, count: |s: &Self| s.unknown_count },
    ];

    fn bucket_mut(&mut self, severity: Severity) -> Option<&mut u64> {
        Some(match severity {
            Severity::Critical => &mut self.critical_count,
            Severity::High => &mut self.high_count,
            Severity::Medium => &mut self.medium_count,
            Severity::Low => &mut self.low_count,
            Severity::Unknown => &mut self.unknown_count,
        })
    }
}

/// Failed configuration audit checks by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigAuditSummary {
    #[serde(default)]
    pub critical_count: u64,
    #[serde(default)]
    pub high_count: u64,
    #[serde(default)]
    pub medium_count: u64,
    #[serde(default)]
    pub low_count: u64,
}

impl SeveritySummary for ConfigAuditSummary {
    const BUCKETS: &'static [SeverityBucket<Self>] = &[
        SeverityBucket { severity: Severity::Critical, count: |s: &Self| s.critical_count },
        SeverityBucket { severity: Severity::High, count: |s: &Self| s.high_count },
        SeverityBucket { severity: Severity::Medium, count: |s: &Self| s.medium_count },
        SeverityBucket { severity: Severity::Low, count: |s: &Self| s.low_count },
    ];

    fn bucket_mut(&mut self, severity: Severity) -> Option<&mut u64> {
        match severity {
            Severity::Critical => Some(&mut self.critical_count),
            Severity::High => Some(&mut self.high_count),
            Severity::Medium => Some(&mut self.medium_count),
            Severity::Low => Some(&mut self.low_count),
            Severity::Unknown => None,
        }
    }
}

/// Failed RBAC assessment checks by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RbacAssessmentSummary {
    #[serde(default)]
    pub critical_count: u64,
    #[serde(default)]
    pub high_count: u64,
    #[serde(default)]
    pub medium_count: u64,
    #[serde(default)]
    pub low_count: u64,
}

impl SeveritySummary for RbacAssessmentSummary {
    const BUCKETS: &'static [SeverityBucket<Self>] = &[
        SeverityBucket { severity: Severity::Critical, count: |s: &Self| s.critical_count },
        SeverityBucket { severity: Severity::High, count: |s: &Self| s.high_count },
        SeverityBucket { severity: Severity::Medium, count: |s: &Self| s.medium_count },
        SeverityBucket { severity: Severity::Low, count: |s: &Self| s.low_count },
    ];

    fn bucket_mut(&mut self, severity: Severity) -> Option<&mut u64> {
        match severity {
            Severity::Critical => Some(&mut self.critical_count),
            Severity::High => Some(&mut self.high_count),
            Severity::Medium => Some(&mut self.medium_count),
            Severity::Low => Some(&mut self.low_count),
            Severity::Unknown => None,
        }
    }
}
