//! Gauge emission for report summaries.
//!
//! A [`ReportDescriptor`] fixes a metric's name, help text and label schema.
//! Label tuples are arrays sized by the descriptor, so a tuple with the
//! wrong cardinality does not compile. The last label of every report
//! descriptor is `severity`; [`emit_summary`] fills it from the summary's
//! bucket table and writes one sample per bucket, zero counts included.

use ahash::AHashMap as HashMap;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use tracing::error;

use crate::report::SeveritySummary;

/// Name, help text and ordered label schema of a gauge family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportDescriptor<const N: usize> {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: [&'static str; N],
}

impl<const N: usize> ReportDescriptor<N> {
    /// Builds the prometheus descriptor for this family.
    pub fn desc(&self) -> prometheus::Result<Desc> {
        Desc::new(
            self.name.to_string(),
            self.help.to_string(),
            self.labels.iter().map(|l| l.to_string()).collect(),
            std::collections::HashMap::new(),
        )
    }

    pub fn gauge_vec(&self) -> prometheus::Result<GaugeVec> {
        GaugeVec::new(Opts::new(self.name, self.help), &self.labels)
    }
}

/// Destination for emitted gauge samples.
///
/// Sinks buffer every sample they are given; none of them drop samples.
pub trait MetricSink {
    fn gauge<const N: usize>(
        &mut self,
        descriptor: &ReportDescriptor<N>,
        label_values: &[&str; N],
        value: f64,
    );
}

/// Writes one gauge sample.
pub fn emit<S: MetricSink, const N: usize>(
    sink: &mut S,
    descriptor: &ReportDescriptor<N>,
    label_values: &[&str; N],
    value: f64,
) {
    sink.gauge(descriptor, label_values, value);
}

/// Writes one sample per severity bucket of `summary`.
///
/// `label_values` carries the report identity; its last slot is
/// overwritten with each bucket's severity label in table order.
pub fn emit_summary<S, T, const N: usize>(
    sink: &mut S,
    descriptor: &ReportDescriptor<N>,
    mut label_values: [&str; N],
    summary: &T,
) where
    S: MetricSink,
    T: SeveritySummary,
{
    for bucket in T::BUCKETS {
        label_values[N - 1] = bucket.severity.label();
        emit(sink, descriptor, &label_values, (bucket.count)(summary) as f64);
    }
}

/// A recorded gauge sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub metric: &'static str,
    pub labels: Vec<(&'static str, String)>,
    pub value: f64,
}

impl Sample {
    /// Value of label `name`, if present.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(label, _)| *label == name)
            .map(|(_, value)| value.as_str())
    }

    /// Label values in schema order.
    pub fn label_values(&self) -> Vec<&str> {
        self.labels.iter().map(|(_, value)| value.as_str()).collect()
    }
}

/// Sink that keeps samples in emission order.
#[derive(Debug, Default)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
}

impl SampleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Samples written for `metric`, in emission order.
    pub fn for_metric<'a>(&'a self, metric: &'a str) -> impl Iterator<Item = &'a Sample> + 'a {
        self.samples.iter().filter(move |s| s.metric == metric)
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

impl MetricSink for SampleBuffer {
    fn gauge<const N: usize>(
        &mut self,
        descriptor: &ReportDescriptor<N>,
        label_values: &[&str; N],
        value: f64,
    ) {
        self.samples.push(Sample {
            metric: descriptor.name,
            labels: descriptor
                .labels
                .iter()
                .zip(label_values.iter())
                .map(|(name, value)| (*name, value.to_string()))
                .collect(),
            value,
        });
    }
}

/// Sink that builds prometheus metric families, one gauge vector per
/// registered descriptor.
#[derive(Default)]
pub struct GaugeFamilySink {
    families: HashMap<&'static str, GaugeFamily>,
    order: Vec<&'static str>,
}

struct GaugeFamily {
    vec: GaugeVec,
    /// Gauge writes, repeated label tuples included.
    writes: usize,
}

impl GaugeFamilySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a gauge family for `descriptor`. Re-registering is a no-op.
    pub fn register<const N: usize>(
        &mut self,
        descriptor: &ReportDescriptor<N>,
    ) -> prometheus::Result<()> {
        if self.families.contains_key(descriptor.name) {
            return Ok(());
        }
        let family = GaugeFamily {
            vec: descriptor.gauge_vec()?,
            writes: 0,
        };
        self.families.insert(descriptor.name, family);
        self.order.push(descriptor.name);
        Ok(())
    }

    /// Number of distinct series held. Writing the same label tuple twice
    /// overwrites the earlier value and counts once.
    pub fn len(&self) -> usize {
        self.families
            .values()
            .filter(|f| f.writes > 0)
            .flat_map(|f| f.vec.collect())
            .map(|mf| mf.get_metric().len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.families.values().all(|f| f.writes == 0)
    }

    /// Drains the collected families in registration order. Families that
    /// received no samples are left out.
    pub fn into_families(self) -> Vec<MetricFamily> {
        let GaugeFamilySink { families, order } = self;
        order
            .iter()
            .filter_map(|name| families.get(name))
            .filter(|family| family.writes > 0)
            .flat_map(|family| family.vec.collect())
            .collect()
    }
}

impl MetricSink for GaugeFamilySink {
    fn gauge<const N: usize>(
        &mut self,
        descriptor: &ReportDescriptor<N>,
        label_values: &[&str; N],
        value: f64,
    ) {
        match self.families.get_mut(descriptor.name) {
            Some(family) => {
                family.vec.with_label_values(&label_values[..]).set(value);
                family.writes += 1;
            }
            None => error!(
                "Gauge family {} was not registered with the sink",
                descriptor.name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{ConfigAuditSummary, VulnerabilitySummary};
    use prometheus::{Encoder, TextEncoder};

    const AUDITS: ReportDescriptor<3> = ReportDescriptor {
        name: "test_resource_configaudits",
        help: "Number of failing checks",
        labels: ["namespace", "name", "severity"],
    };

    const VULNS: ReportDescriptor<3> = ReportDescriptor {
        name: "test_image_vulnerabilities",
        help: "Number of vulnerabilities",
        labels: ["namespace", "name", "severity"],
    };

    #[test]
    fn test_emit_summary_writes_every_bucket_in_order() {
        let mut sink = SampleBuffer::new();
        let summary = ConfigAuditSummary {
            high_count: 4,
            ..ConfigAuditSummary::default()
        };

        emit_summary(&mut sink, &AUDITS, ["ns1", "deployment-web", ""], &summary);

        let severities: Vec<&str> = sink
            .samples()
            .iter()
            .filter_map(|s| s.label("severity"))
            .collect();
        assert_eq!(severities, vec!["Critical", "High", "Medium", "Low"]);

        let values: Vec<f64> = sink.samples().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![0.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sample_labels_follow_descriptor_schema() {
        let mut sink = SampleBuffer::new();
        emit(&mut sink, &AUDITS, &["ns1", "pod-a", "Low"], 1.0);

        let sample = &sink.samples()[0];
        assert_eq!(sample.metric, "test_resource_configaudits");
        assert_eq!(sample.label_values(), vec!["ns1", "pod-a", "Low"]);
        assert_eq!(sample.label("name"), Some("pod-a"));
        assert_eq!(sample.label("missing"), None);
    }

    #[test]
    fn test_gauge_family_sink_builds_families() {
        let mut sink = GaugeFamilySink::new();
        sink.register(&AUDITS).unwrap();
        sink.register(&VULNS).unwrap();
        sink.register(&AUDITS).unwrap();

        emit_summary(
            &mut sink,
            &VULNS,
            ["ns1", "app", ""],
            &VulnerabilitySummary::default(),
        );

        assert_eq!(sink.len(), 5);

        let families = sink.into_families();
        assert_eq!(families.len(), 1);

        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let samples = text
            .lines()
            .filter(|l| l.starts_with("test_image_vulnerabilities{"))
            .count();
        assert_eq!(samples, 5);
        assert!(!text.contains("test_resource_configaudits"));
    }

    #[test]
    fn test_repeated_label_tuple_is_one_series() {
        let mut sink = GaugeFamilySink::new();
        sink.register(&AUDITS).unwrap();

        emit(&mut sink, &AUDITS, &["ns1", "pod-a", "Low"], 1.0);
        emit(&mut sink, &AUDITS, &["ns1", "pod-a", "Low"], 3.0);
        emit(&mut sink, &AUDITS, &["ns1", "pod-a", "High"], 2.0);
        assert_eq!(sink.len(), 2);

        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&sink.into_families(), &mut buf)
            .unwrap();
        let text = String::from_utf8(buf).unwrap();
        let low = text
            .lines()
            .find(|l| l.contains("severity=\"Low\""))
            .unwrap();
        assert!(low.ends_with(" 3"));
    }

    #[test]
    fn test_unregistered_family_is_not_emitted() {
        let mut sink = GaugeFamilySink::new();
        emit(&mut sink, &AUDITS, &["ns1", "pod-a", "Low"], 1.0);
        assert!(sink.is_empty());
        assert!(sink.into_families().is_empty());
    }
}
