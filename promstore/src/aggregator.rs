use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Deserialize;

use crate::{
    buckets::BucketPolicy,
    error::{Error, Result},
    labels::Labels,
    store::MetricStore,
    value::{now_micros, sort_metrics, Metric, MetricKind, Observation},
};

/// Default histogram upper bounds, the same as the Prometheus client
/// libraries.
pub const DEFAULT_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AggregatorConfig {
    /// Prefix joined to every metric name with `_`.
    pub namespace: Option<String>,
    /// Labels put in front of the labels of every observation.
    pub labels: Vec<(String, String)>,
    /// Upper bounds of histograms without an entry in `histograms`.
    pub buckets: Vec<f64>,
    /// Upper bounds per histogram name, before the namespace is applied.
    pub histograms: FxHashMap<String, Vec<f64>>,
    pub bucket_policy: BucketPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            labels: Vec::new(),
            buckets: DEFAULT_BUCKETS.to_vec(),
            histograms: FxHashMap::default(),
            bucket_policy: BucketPolicy::default(),
        }
    }
}

/// Front end of a [`MetricStore`]: names, constant labels, histogram
/// bounds, help texts and timestamps are filled in before recording.
///
/// There is no process-wide instance; build one and share it.
#[derive(Debug)]
pub struct Aggregator {
    namespace: Option<String>,
    labels: Labels,
    buckets: Arc<[f64]>,
    histograms: RwLock<FxHashMap<String, Arc<[f64]>>>,
    help: RwLock<FxHashMap<String, String>>,
    store: MetricStore,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            namespace: None,
            labels: Labels::default(),
            buckets: DEFAULT_BUCKETS.into(),
            histograms: Default::default(),
            help: Default::default(),
            store: MetricStore::default(),
        }
    }
}

impl Aggregator {
    pub fn new(config: AggregatorConfig) -> Result<Self> {
        validate_buckets("default", &config.buckets)?;
        for (name, buckets) in &config.histograms {
            validate_buckets(name, buckets)?;
        }
        let namespace = config
            .namespace
            .filter(|ns| !ns.is_empty())
            .map(|ns| sanitize_name(&ns));
        let histograms: FxHashMap<String, Arc<[f64]>> = config
            .histograms
            .into_iter()
            .map(|(name, buckets)| (metric_name(namespace.as_deref(), &name), buckets.into()))
            .collect();
        Ok(Self {
            labels: Labels::new(config.labels),
            buckets: config.buckets.into(),
            histograms: RwLock::new(histograms),
            help: Default::default(),
            store: MetricStore::with_bucket_policy(config.bucket_policy),
            namespace,
        })
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Sets the help text reported with `name` from the next record on.
    pub fn describe(&self, name: &str, help: impl Into<String>) {
        let name = self.full_name(name);
        self.help.write().insert(name, help.into());
    }

    /// Sets the upper bounds of histogram `name`.
    ///
    /// Series that already exist keep their bounds unless the number of
    /// bounds changes.
    pub fn set_buckets(&self, name: &str, buckets: Vec<f64>) -> Result<()> {
        validate_buckets(name, &buckets)?;
        let name = self.full_name(name);
        self.histograms.write().insert(name, buckets.into());
        Ok(())
    }

    /// Adds `delta` to counter `name`.
    pub fn add(&self, name: &str, labels: &Labels, delta: f64) -> Result<()> {
        self.record(MetricKind::Counter, name, labels, delta)
    }

    /// Sets gauge `name` to `value`.
    pub fn set(&self, name: &str, labels: &Labels, value: f64) -> Result<()> {
        self.record(MetricKind::Gauge, name, labels, value)
    }

    /// Adds `value` to histogram `name`.
    pub fn observe(&self, name: &str, labels: &Labels, value: f64) -> Result<()> {
        self.record(MetricKind::Histogram, name, labels, value)
    }

    pub fn record(&self, kind: MetricKind, name: &str, labels: &Labels, value: f64) -> Result<()> {
        self.record_at(kind, name, labels, value, now_micros())
    }

    pub fn record_at(
        &self,
        kind: MetricKind,
        name: &str,
        labels: &Labels,
        value: f64,
        timestamp: i64,
    ) -> Result<()> {
        let name = self.full_name(name);
        let labels = if self.labels.is_empty() {
            labels.clone()
        } else {
            self.labels.concat(labels)
        };
        let help = self.help.read().get(&name).cloned().unwrap_or_default();
        let buckets = match kind {
            MetricKind::Histogram => Some(
                self.histograms
                    .read()
                    .get(&name)
                    .map_or_else(|| Arc::clone(&self.buckets), Arc::clone),
            ),
            _ => None,
        };
        self.store.update(&Observation {
            kind,
            name: &name,
            help: &help,
            labels: &labels,
            value,
            timestamp,
            buckets: buckets.as_deref().unwrap_or(&[]),
        })
    }

    /// Collects every series, sorted by name then labels.
    pub fn snapshot(&self) -> Vec<Metric> {
        let mut metrics = self.store.collect();
        sort_metrics(&mut metrics);
        metrics
    }

    fn full_name(&self, name: &str) -> String {
        metric_name(self.namespace.as_deref(), name)
    }
}

/// Joins `namespace` and `name` and replaces characters not allowed in
/// metric names.
pub fn metric_name(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) => format!("{}_{}", sanitize_name(ns), sanitize_name(name)),
        None => sanitize_name(name),
    }
}

fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 1);
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        out.push('_');
    }
    out.extend(name.chars().map(|c| {
        if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
            c
        } else {
            '_'
        }
    }));
    out
}

fn validate_buckets(name: &str, buckets: &[f64]) -> Result<()> {
    let invalid = |reason: &str| {
        Err(Error::InvalidBuckets {
            name: name.to_owned(),
            reason: reason.to_owned(),
        })
    };
    if buckets.is_empty() {
        return invalid("no upper bounds");
    }
    if buckets.iter().any(|b| !b.is_finite()) {
        return invalid("upper bounds must be finite");
    }
    if buckets.windows(2).any(|w| w[0] >= w[1]) {
        return invalid("upper bounds are not strictly increasing");
    }
    Ok(())
}
