//! Local report cache and the read path the collector lists through.
//!
//! The cache holds an immutable snapshot of every report kind behind an
//! `Arc`. Listings clone out of one snapshot, so each listing is internally
//! consistent even while a resync swaps in new contents. A caller that
//! needs several listings to agree pins one snapshot through
//! [`ReportLister::pinned`] and lists from that. Nothing in here talks to a
//! remote server.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use crate::report::{
    ConfigAuditReport, ExposedSecretReport, ObjectMeta, RbacAssessmentReport, ReportKind,
    VulnerabilityReport,
};

/// Boxed error for lister backends outside this crate.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure of a single cache read.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("report cache has not completed its initial sync")]
    NotSynced,

    #[error("lister returned {found} for a {expected} request")]
    UnexpectedKind {
        expected: ReportKind,
        found: ReportKind,
    },

    #[error("{0}")]
    Backend(#[source] BoxError),
}

/// A listing of one report kind in one namespace scope failed.
#[derive(Debug, Error)]
#[error("failed to list {kind} in {}: {source}", scope_label(.namespace))]
pub struct ListError {
    pub kind: ReportKind,
    /// `None` for a cluster-wide listing.
    pub namespace: Option<String>,
    #[source]
    pub source: CacheError,
}

fn scope_label(namespace: &Option<String>) -> &str {
    namespace.as_deref().unwrap_or("all namespaces")
}

/// Reports of a single kind, as returned by a [`ReportLister`].
#[derive(Debug, Clone)]
pub enum ReportList {
    Vulnerability(Vec<VulnerabilityReport>),
    ExposedSecret(Vec<ExposedSecretReport>),
    ConfigAudit(Vec<ConfigAuditReport>),
    RbacAssessment(Vec<RbacAssessmentReport>),
}

impl ReportList {
    pub fn kind(&self) -> ReportKind {
        match self {
            ReportList::Vulnerability(_) => ReportKind::Vulnerability,
            ReportList::ExposedSecret(_) => ReportKind::ExposedSecret,
            ReportList::ConfigAudit(_) => ReportKind::ConfigAudit,
            ReportList::RbacAssessment(_) => ReportKind::RbacAssessment,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReportList::Vulnerability(items) => items.len(),
            ReportList::ExposedSecret(items) => items.len(),
            ReportList::ConfigAudit(items) => items.len(),
            ReportList::RbacAssessment(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only access to cached reports.
///
/// `namespace == None` lists across all namespaces. Implementations must
/// serve reads from local state and be safe to call from several scrapes
/// at once.
pub trait ReportLister: Send + Sync {
    fn list(&self, kind: ReportKind, namespace: Option<&str>) -> Result<ReportList, CacheError>;

    /// A lister frozen at the current state, if the backend can provide
    /// one. Listings through it are unaffected by later writes.
    fn pinned(&self) -> Option<Arc<dyn ReportLister>> {
        None
    }
}

/// Key of a cached report: (namespace, name).
pub type ObjectKey = (String, String);

/// A report type that can be stored in and listed from the cache.
pub trait CachedReport: Clone + Send + Sync + 'static {
    const KIND: ReportKind;

    fn metadata(&self) -> &ObjectMeta;

    fn into_list(items: Vec<Self>) -> ReportList;

    /// Unwraps a listing of this kind, handing back any other kind.
    fn from_list(list: ReportList) -> Result<Vec<Self>, ReportList>;

    fn store(contents: &CacheContents) -> &HashMap<ObjectKey, Self>;

    fn store_mut(contents: &mut CacheContents) -> &mut HashMap<ObjectKey, Self>;

    fn key(&self) -> ObjectKey {
        let meta = self.metadata();
        (meta.namespace.clone(), meta.name.clone())
    }
}

macro_rules! cached_report {
    ($report:ty, $variant:ident, $field:ident) => {
        impl CachedReport for $report {
            const KIND: ReportKind = ReportKind::$variant;

            fn metadata(&self) -> &ObjectMeta {
                &self.metadata
            }

            fn into_list(items: Vec<Self>) -> ReportList {
                ReportList::$variant(items)
            }

            fn from_list(list: ReportList) -> Result<Vec<Self>, ReportList> {
                match list {
                    ReportList::$variant(items) => Ok(items),
                    other => Err(other),
                }
            }

            fn store(contents: &CacheContents) -> &HashMap<ObjectKey, Self> {
                &contents.$field
            }

            fn store_mut(contents: &mut CacheContents) -> &mut HashMap<ObjectKey, Self> {
                &mut contents.$field
            }
        }
    };
}

cached_report!(VulnerabilityReport, Vulnerability, vulnerability);
cached_report!(ExposedSecretReport, ExposedSecret, exposed_secret);
cached_report!(ConfigAuditReport, ConfigAudit, config_audit);
cached_report!(RbacAssessmentReport, RbacAssessment, rbac_assessment);

/// One consistent view of every cached report.
#[derive(Debug, Clone, Default)]
pub struct CacheContents {
    vulnerability: HashMap<ObjectKey, VulnerabilityReport>,
    exposed_secret: HashMap<ObjectKey, ExposedSecretReport>,
    config_audit: HashMap<ObjectKey, ConfigAuditReport>,
    rbac_assessment: HashMap<ObjectKey, RbacAssessmentReport>,
    last_synced: Option<DateTime<Utc>>,
}

impl CacheContents {
    /// Inserts or replaces a report, keyed by namespace and name.
    pub fn insert<R: CachedReport>(&mut self, report: R) {
        R::store_mut(self).insert(report.key(), report);
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.last_synced
    }

    /// Lists reports of type `R` in this snapshot, sorted by namespace and
    /// name. Fails if the snapshot was never synced.
    pub fn list_typed<R: CachedReport>(&self, namespace: Option<&str>) -> Result<Vec<R>, CacheError> {
        if self.last_synced.is_none() {
            return Err(CacheError::NotSynced);
        }

        let mut items: Vec<R> = R::store(self)
            .iter()
            .filter(|((ns, _), _)| namespace.map_or(true, |target| ns == target))
            .map(|(_, report)| report.clone())
            .collect();
        items.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(items)
    }

    pub fn counts(&self) -> CacheCounts {
        CacheCounts {
            vulnerability_reports: self.vulnerability.len(),
            exposed_secret_reports: self.exposed_secret.len(),
            config_audit_reports: self.config_audit.len(),
            rbac_assessment_reports: self.rbac_assessment.len(),
        }
    }
}

/// Number of cached reports per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheCounts {
    pub vulnerability_reports: usize,
    pub exposed_secret_reports: usize,
    pub config_audit_reports: usize,
    pub rbac_assessment_reports: usize,
}

impl CacheCounts {
    pub fn total(&self) -> usize {
        self.vulnerability_reports
            + self.exposed_secret_reports
            + self.config_audit_reports
            + self.rbac_assessment_reports
    }
}

/// In-process report cache.
#[derive(Debug, Default)]
pub struct ReportCache {
    contents: RwLock<Arc<CacheContents>>,
}

impl ReportCache {
    /// Creates an empty cache that has not synced yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> Arc<CacheContents> {
        self.contents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swaps in a complete set of reports and marks the cache synced.
    pub fn replace_all(&self, mut contents: CacheContents) {
        contents.last_synced = Some(Utc::now());
        *self.contents.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(contents);
    }

    /// Inserts or replaces a single report.
    pub fn upsert<R: CachedReport>(&self, report: R) {
        let mut guard = self.contents.write().unwrap_or_else(PoisonError::into_inner);
        Arc::make_mut(&mut guard).insert(report);
    }

    /// Removes a single report, returning it if it was cached.
    pub fn remove<R: CachedReport>(&self, namespace: &str, name: &str) -> Option<R> {
        let mut guard = self.contents.write().unwrap_or_else(PoisonError::into_inner);
        let key = (namespace.to_string(), name.to_string());
        if !R::store(&guard).contains_key(&key) {
            return None;
        }
        R::store_mut(Arc::make_mut(&mut guard)).remove(&key)
    }

    pub fn is_synced(&self) -> bool {
        self.last_synced().is_some()
    }

    pub fn last_synced(&self) -> Option<DateTime<Utc>> {
        self.snapshot().last_synced
    }

    pub fn counts(&self) -> CacheCounts {
        self.snapshot().counts()
    }

    /// Lists cached reports of type `R`, sorted by namespace and name.
    pub fn list_typed<R: CachedReport>(&self, namespace: Option<&str>) -> Result<Vec<R>, CacheError> {
        self.snapshot().list_typed(namespace)
    }
}

impl ReportLister for CacheContents {
    fn list(&self, kind: ReportKind, namespace: Option<&str>) -> Result<ReportList, CacheError> {
        Ok(match kind {
            ReportKind::Vulnerability => {
                ReportList::Vulnerability(self.list_typed(namespace)?)
            }
            ReportKind::ExposedSecret => {
                ReportList::ExposedSecret(self.list_typed(namespace)?)
            }
            ReportKind::ConfigAudit => ReportList::ConfigAudit(self.list_typed(namespace)?),
            ReportKind::RbacAssessment => {
                ReportList::RbacAssessment(self.list_typed(namespace)?)
            }
        })
    }
}

impl ReportLister for ReportCache {
    fn list(&self, kind: ReportKind, namespace: Option<&str>) -> Result<ReportList, CacheError> {
        self.snapshot().list(kind, namespace)
    }

    fn pinned(&self) -> Option<Arc<dyn ReportLister>> {
        Some(self.snapshot())
    }
}

/// Namespace scopes to list for a target namespace set.
///
/// An empty set yields a single cluster-wide scope (`None`), never zero
/// scopes.
pub fn namespace_scopes(namespaces: &[String]) -> impl Iterator<Item = Option<&str>> {
    let cluster_wide = namespaces.is_empty().then_some(None);
    cluster_wide
        .into_iter()
        .chain(namespaces.iter().map(|ns| Some(ns.as_str())))
}

/// Lists reports of type `R` across `namespaces`, one result per scope.
///
/// A failed scope yields a [`ListError`] carrying the namespace; the
/// remaining scopes are still listed.
pub fn list_reports<'a, R: CachedReport>(
    lister: &'a dyn ReportLister,
    namespaces: &'a [String],
) -> impl Iterator<Item = Result<Vec<R>, ListError>> + 'a {
    namespace_scopes(namespaces).map(move |scope| {
        lister
            .list(R::KIND, scope)
            .and_then(|list| {
                R::from_list(list).map_err(|other| CacheError::UnexpectedKind {
                    expected: R::KIND,
                    found: other.kind(),
                })
            })
            .map_err(|source| ListError {
                kind: R::KIND,
                namespace: scope.map(str::to_string),
                source,
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audit(namespace: &str, name: &str) -> ConfigAuditReport {
        ConfigAuditReport {
            metadata: ObjectMeta::new(namespace, name),
            ..ConfigAuditReport::default()
        }
    }

    fn synced_cache() -> ReportCache {
        let mut contents = CacheContents::default();
        contents.insert(audit("ns1", "deployment-b"));
        contents.insert(audit("ns1", "deployment-a"));
        contents.insert(audit("ns2", "daemonset-c"));
        let cache = ReportCache::new();
        cache.replace_all(contents);
        cache
    }

    #[test]
    fn test_unsynced_cache_fails_listing() {
        let cache = ReportCache::new();
        assert!(!cache.is_synced());
        let result = cache.list(ReportKind::ConfigAudit, None);
        assert!(matches!(result, Err(CacheError::NotSynced)));
    }

    #[test]
    fn test_list_filters_by_namespace_and_sorts() {
        let cache = synced_cache();
        let items: Vec<ConfigAuditReport> = cache.list_typed(Some("ns1")).unwrap();
        let names: Vec<&str> = items.iter().map(|r| r.metadata.name.as_str()).collect();
        assert_eq!(names, vec!["deployment-a", "deployment-b"]);

        let all: Vec<ConfigAuditReport> = cache.list_typed(None).unwrap();
        assert_eq!(all.len(), 3);

        let none: Vec<ConfigAuditReport> = cache.list_typed(Some("ns3")).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_list_returns_requested_kind() {
        let cache = synced_cache();
        let list = cache.list(ReportKind::Vulnerability, None).unwrap();
        assert_eq!(list.kind(), ReportKind::Vulnerability);
        assert!(list.is_empty());
    }

    #[test]
    fn test_upsert_and_remove() {
        let cache = synced_cache();
        cache.upsert(audit("ns2", "statefulset-d"));
        assert_eq!(cache.counts().config_audit_reports, 4);

        let removed: Option<ConfigAuditReport> = cache.remove("ns2", "statefulset-d");
        assert!(removed.is_some());
        let missing: Option<ConfigAuditReport> = cache.remove("ns2", "statefulset-d");
        assert!(missing.is_none());
        assert_eq!(cache.counts().total(), 3);
    }

    #[test]
    fn test_snapshot_is_unaffected_by_later_writes() {
        let cache = synced_cache();
        let before = cache.snapshot();
        cache.upsert(audit("ns3", "job-e"));
        assert_eq!(before.counts().config_audit_reports, 3);
        assert_eq!(cache.counts().config_audit_reports, 4);
    }

    #[test]
    fn test_pinned_lister_ignores_later_resync() {
        let cache = synced_cache();
        let pinned = cache.pinned().unwrap();

        let mut replacement = CacheContents::default();
        replacement.insert(audit("ns9", "pod-z"));
        cache.replace_all(replacement);

        let list = pinned.list(ReportKind::ConfigAudit, None).unwrap();
        assert_eq!(list.len(), 3);
        let live = cache.list(ReportKind::ConfigAudit, None).unwrap();
        assert_eq!(live.len(), 1);
    }

    #[test]
    fn test_empty_namespace_set_is_one_cluster_wide_scope() {
        let scopes: Vec<Option<&str>> = namespace_scopes(&[]).collect();
        assert_eq!(scopes, vec![None]);

        let namespaces = vec!["a".to_string(), "b".to_string()];
        let scopes: Vec<Option<&str>> = namespace_scopes(&namespaces).collect();
        assert_eq!(scopes, vec![Some("a"), Some("b")]);
    }

    #[test]
    fn test_list_reports_wraps_errors_with_scope() {
        let cache = ReportCache::new();
        let namespaces = vec!["ns1".to_string()];
        let results: Vec<_> = list_reports::<ConfigAuditReport>(&cache, &namespaces).collect();
        assert_eq!(results.len(), 1);

        let err = results.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.kind, ReportKind::ConfigAudit);
        assert_eq!(err.namespace.as_deref(), Some("ns1"));
        assert_eq!(
            err.to_string(),
            "failed to list configauditreports in ns1: report cache has not completed its initial sync"
        );
    }

    #[test]
    fn test_list_reports_rejects_mismatched_kind() {
        struct WrongKind;
        impl ReportLister for WrongKind {
            fn list(&self, _: ReportKind, _: Option<&str>) -> Result<ReportList, CacheError> {
                Ok(ReportList::RbacAssessment(Vec::new()))
            }
        }

        let results: Vec<_> = list_reports::<VulnerabilityReport>(&WrongKind, &[]).collect();
        let err = results.into_iter().next().unwrap().unwrap_err();
        assert!(err.namespace.is_none());
        assert!(matches!(
            err.source,
            CacheError::UnexpectedKind {
                expected: ReportKind::Vulnerability,
                found: ReportKind::RbacAssessment
            }
        ));
    }
}
