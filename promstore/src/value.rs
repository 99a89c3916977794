use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use time::OffsetDateTime;

use crate::labels::Labels;

pub const FIELD_HASH: &str = "__hash__";
pub const FIELD_NAME: &str = "__name__";
pub const FIELD_TYPE: &str = "metric_type";
pub const FIELD_TIME: &str = "_timestamp";
pub const FIELD_VALUE: &str = "value";
pub const FIELD_BUCKET: &str = "le";

pub const SUFFIX_BUCKET: &str = "_bucket";
pub const SUFFIX_SUM: &str = "_sum";
pub const SUFFIX_COUNT: &str = "_count";

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Untyped,
    Counter,
    Gauge,
    Histogram,
    Summary,
}

/// A single exposable sample, as produced by [`MetricStore::collect`].
///
/// [`MetricStore::collect`]: crate::MetricStore::collect
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub kind: MetricKind,
    pub name: String,
    pub help: String,
    pub value: f64,
    /// Time in microseconds
    pub timestamp: i64,
    pub labels: Labels,
}

impl Metric {
    /// Name of the metric family this sample belongs to, without the
    /// histogram suffix.
    pub fn root_name(&self) -> &str {
        if self.kind != MetricKind::Histogram {
            return &self.name;
        }
        [SUFFIX_BUCKET, SUFFIX_SUM, SUFFIX_COUNT]
            .iter()
            .find_map(|suffix| self.name.strip_suffix(suffix))
            .unwrap_or(&self.name)
    }
}

/// One observation handed to [`MetricStore::update`].
///
/// Borrows everything so that updates to known series do not allocate.
///
/// [`MetricStore::update`]: crate::MetricStore::update
#[derive(Debug, Clone, Copy)]
pub struct Observation<'a> {
    pub kind: MetricKind,
    pub name: &'a str,
    pub help: &'a str,
    pub labels: &'a Labels,
    pub value: f64,
    /// Time in microseconds
    pub timestamp: i64,
    /// Histogram bucket boundaries, ignored for other kinds.
    pub buckets: &'a [f64],
}

/// Sorts samples by name, then by label set.
pub fn sort_metrics(metrics: &mut [Metric]) {
    metrics.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.labels.cmp(&b.labels)));
}

/// Current wall-clock time in microseconds.
pub fn now_micros() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample(name: &str, labels: Labels) -> Metric {
        Metric {
            kind: MetricKind::Counter,
            name: name.to_owned(),
            help: String::new(),
            value: 0.0,
            timestamp: 0,
            labels,
        }
    }

    #[test]
    fn test_metric_kind_names() {
        assert_eq!(MetricKind::Histogram.to_string(), "histogram");
        assert_eq!(MetricKind::Untyped.as_ref(), "untyped");
        assert_eq!(MetricKind::from_str("gauge").unwrap(), MetricKind::Gauge);
        assert_eq!(MetricKind::from_str("summary").unwrap(), MetricKind::Summary);
        assert!(MetricKind::from_str("timer").is_err());
    }

    #[test]
    fn test_root_name() {
        let mut m = sample("latency_bucket", Labels::default());
        assert_eq!(m.root_name(), "latency_bucket");
        m.kind = MetricKind::Histogram;
        assert_eq!(m.root_name(), "latency");
        m.name = "latency_count".to_owned();
        assert_eq!(m.root_name(), "latency");
    }

    #[test]
    fn test_sort_metrics() {
        let mut metrics = vec![
            sample("b", Labels::default()),
            sample("a", Labels::new([("x", "2")])),
            sample("a", Labels::new([("x", "1"), ("y", "1")])),
            sample("a", Labels::new([("x", "1")])),
        ];
        sort_metrics(&mut metrics);
        let order = metrics
            .iter()
            .map(|m| format!("{}{:?}", m.name, m.labels.iter().map(|l| &l.value).collect::<Vec<_>>()))
            .collect::<Vec<_>>();
        assert_eq!(order, ["a[\"1\"]", "a[\"1\", \"1\"]", "a[\"2\"]", "b[]"]);
    }

    #[test]
    fn test_now_micros() {
        let before = now_micros();
        assert!(before > 1_600_000_000_000_000);
        assert!(now_micros() >= before);
    }
}
