//! On-demand Prometheus collector for cached assessment reports.
//!
//! `ResourcesMetricsCollector` produces its gauges at scrape time from the
//! report cache rather than maintaining them on reconcile. Metrics therefore
//! never go stale waiting for a reconcile, and deleted reports disappear
//! from the next scrape without any cleanup. Every read is served from the
//! local cache, so a scrape never reaches the API server.
//!
//! Each pass lists every report kind in every target namespace. A failed
//! listing is logged and skipped; the rest of the pass carries on.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use std::sync::Arc;
use tracing::{debug, error};

use crate::cache::{list_reports, CachedReport, ReportLister};
use crate::config::{normalize_namespaces, Config};
use crate::emitter::{emit_summary, GaugeFamilySink, MetricSink, ReportDescriptor};
use crate::report::{
    Artifact, ConfigAuditReport, ExposedSecretReport, ImageRegistry, ObjectMeta,
    VulnerabilityReport,
};

const IMAGE_LABELS: [&str; 7] = [
    "namespace",
    "name",
    "image_registry",
    "image_repository",
    "image_tag",
    "image_digest",
    "severity",
];

const RESOURCE_LABELS: [&str; 3] = ["namespace", "name", "severity"];

pub const IMAGE_VULNERABILITIES: ReportDescriptor<7> = ReportDescriptor {
    name: "trivy_image_vulnerabilities",
    help: "Number of container image vulnerabilities",
    labels: IMAGE_LABELS,
};

pub const IMAGE_EXPOSED_SECRETS: ReportDescriptor<7> = ReportDescriptor {
    name: "trivy_image_exposedsecrets",
    help: "Number of image exposed secrets",
    labels: IMAGE_LABELS,
};

pub const RESOURCE_CONFIG_AUDITS: ReportDescriptor<3> = ReportDescriptor {
    name: "trivy_resource_configaudits",
    help: "Number of failing resource configuration auditing checks",
    labels: RESOURCE_LABELS,
};

/// Identity labels of an image-scoped report; the severity slot is filled
/// per bucket.
fn image_labels<'a>(
    meta: &'a ObjectMeta,
    registry: &'a ImageRegistry,
    artifact: &'a Artifact,
) -> [&'a str; 7] {
    [
        meta.namespace.as_str(),
        meta.name.as_str(),
        registry.server.as_str(),
        artifact.repository.as_str(),
        artifact.tag.as_str(),
        artifact.digest.as_str(),
        "",
    ]
}

fn resource_labels(meta: &ObjectMeta) -> [&str; 3] {
    [meta.namespace.as_str(), meta.name.as_str(), ""]
}

/// Collector that turns cached reports into per-severity gauges.
///
/// Cloning is cheap and clones share descriptors, so a clone can be handed
/// to a registry for unregistration.
#[derive(Clone)]
pub struct ResourcesMetricsCollector {
    lister: Arc<dyn ReportLister>,
    target_namespaces: Arc<[String]>,
    descs: Arc<[Desc]>,
}

impl ResourcesMetricsCollector {
    /// Creates a collector over `lister`. Namespaces are trimmed, blank
    /// entries dropped and duplicates removed; an empty result means all
    /// namespaces.
    pub fn new(
        lister: Arc<dyn ReportLister>,
        target_namespaces: Vec<String>,
    ) -> prometheus::Result<Self> {
        let descs = vec![
            IMAGE_VULNERABILITIES.desc()?,
            IMAGE_EXPOSED_SECRETS.desc()?,
            RESOURCE_CONFIG_AUDITS.desc()?,
        ];
        Ok(Self {
            lister,
            target_namespaces: normalize_namespaces(target_namespaces).into(),
            descs: descs.into(),
        })
    }

    pub fn from_config(lister: Arc<dyn ReportLister>, config: &Config) -> prometheus::Result<Self> {
        Self::new(lister, config.target_namespaces())
    }

    pub fn target_namespaces(&self) -> &[String] {
        &self.target_namespaces
    }

    /// Runs one collection pass, writing every sample into `sink`.
    ///
    /// All listings of a pass read the same cache state when the lister can
    /// pin one.
    pub fn collect_into<S: MetricSink>(&self, sink: &mut S) {
        let pinned = self.lister.pinned();
        let lister = pinned.as_deref().unwrap_or(self.lister.as_ref());

        self.collect_kind::<VulnerabilityReport, _, _>(lister, sink, |sink, r| {
            let labels = image_labels(&r.metadata, &r.report.registry, &r.report.artifact);
            emit_summary(sink, &IMAGE_VULNERABILITIES, labels, &r.report.summary);
        });
        self.collect_kind::<ExposedSecretReport, _, _>(lister, sink, |sink, r| {
            let labels = image_labels(&r.metadata, &r.report.registry, &r.report.artifact);
            emit_summary(sink, &IMAGE_EXPOSED_SECRETS, labels, &r.report.summary);
        });
        self.collect_kind::<ConfigAuditReport, _, _>(lister, sink, |sink, r| {
            let labels = resource_labels(&r.metadata);
            emit_summary(sink, &RESOURCE_CONFIG_AUDITS, labels, &r.report.summary);
        });
    }

    fn collect_kind<R, S, F>(&self, lister: &dyn ReportLister, sink: &mut S, mut emit_report: F)
    where
        R: CachedReport,
        S: MetricSink,
        F: FnMut(&mut S, &R),
    {
        for listing in list_reports::<R>(lister, &self.target_namespaces) {
            match listing {
                Ok(reports) => {
                    debug!("Collected {} {} from cache", reports.len(), R::KIND);
                    for report in &reports {
                        emit_report(sink, report);
                    }
                }
                Err(e) => {
                    error!(
                        kind = %e.kind,
                        namespace = e.namespace.as_deref().unwrap_or(""),
                        "Failed to list reports from cache: {}",
                        e.source
                    );
                }
            }
        }
    }
}

impl Collector for ResourcesMetricsCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut sink = GaugeFamilySink::new();
        let registered = sink
            .register(&IMAGE_VULNERABILITIES)
            .and_then(|_| sink.register(&IMAGE_EXPOSED_SECRETS))
            .and_then(|_| sink.register(&RESOURCE_CONFIG_AUDITS));
        if let Err(e) = registered {
            error!("Invalid report metric descriptor: {}", e);
            return Vec::new();
        }

        self.collect_into(&mut sink);
        sink.into_families()
    }
}
